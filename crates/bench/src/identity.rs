//! Generators for unique throwaway users, guilds, and message bodies.

use palaver::protocol::api::{CreateGuildRequest, RegisterRequest};
use rand::Rng as _;
use uuid::Uuid;

/// Shared by every generated account; the scenarios log back in with it.
pub const PASSWORD: &str = "password123";

/// A fresh registration. Display IDs are capped at 20 characters by the
/// server, so use a short uuid slice.
pub fn new_user() -> RegisterRequest {
    let tag = short_tag();
    RegisterRequest {
        display_id: format!("bench_{tag}"),
        password: PASSWORD.to_string(),
        email: format!("{tag}@bench.example.com"),
        name: format!("Bench User {tag}"),
        bio: "Synthetic load-test account".to_string(),
        icon_url: String::new(),
    }
}

pub fn new_guild() -> CreateGuildRequest {
    CreateGuildRequest {
        name: format!("Bench Guild {}", short_tag()),
        description: "Synthetic load-test guild".to_string(),
        icon_url: String::new(),
    }
}

pub fn message_body(vu: usize, seq: usize) -> String {
    let filler: u32 = rand::rng().random_range(1000..10000);
    format!("bench message {seq} from vu {vu} ({filler})")
}

/// First 12 hex characters of a v4 uuid; unique enough per run.
fn short_tag() -> String {
    let mut tag = Uuid::new_v4().simple().to_string();
    tag.truncate(12);
    tag
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_id_fits_server_limit() {
        let user = new_user();
        assert!(user.display_id.len() <= 20);
        assert_eq!(user.password, PASSWORD);
    }

    #[test]
    fn generated_users_are_distinct() {
        assert_ne!(new_user().email, new_user().email);
    }
}
