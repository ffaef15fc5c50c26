//! Integration tests driving the pkgrel binary against real git repositories

mod helpers;
mod test_build;
mod test_release;
mod test_tags;
