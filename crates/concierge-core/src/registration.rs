//! Registration conversation state machine.
//!
//! Pure transition logic: callers persist the returned record through the
//! storage port's atomic upsert while holding the per-user lock, so two rapid
//! events for the same user can never interleave a read-then-write.

use chrono::Utc;

use crate::domain::{RegistrationState, UserRecord};
use crate::event::Sender;

/// Outcome of one registration transition.
#[derive(Clone, Debug)]
pub struct Transition {
    pub record: UserRecord,
    pub reply: String,
    /// Ask the transport to show the one-time contact keyboard.
    pub request_contact: bool,
    /// Whether the record changed and must be upserted.
    pub persist: bool,
}

/// `/start`: begin (or re-prompt) registration, or greet a registered user.
pub fn on_start(sender: &Sender, existing: Option<UserRecord>) -> Transition {
    match existing {
        None => {
            let record = UserRecord::new(
                sender.id,
                sender.display_name.clone(),
                sender.handle.clone(),
                RegistrationState::AwaitingPhone,
            );
            Transition {
                reply: phone_request(&sender.display_name),
                record,
                request_contact: true,
                persist: true,
            }
        }
        Some(record) if record.state == RegistrationState::AwaitingPhone => {
            // Re-sent prompt; the upsert is keyed by id, so no duplicate row.
            Transition {
                reply: phone_request(&sender.display_name),
                record,
                request_contact: true,
                persist: true,
            }
        }
        Some(record) => Transition {
            reply: format!("Welcome back, {}!", sender.display_name),
            record,
            request_contact: false,
            persist: false,
        },
    }
}

/// A shared contact: completes registration, or updates the stored phone.
pub fn on_contact(sender: &Sender, existing: Option<UserRecord>, phone: &str) -> Transition {
    let mut record = existing.unwrap_or_else(|| {
        // Contact before any /start: register directly.
        UserRecord::new(
            sender.id,
            sender.display_name.clone(),
            sender.handle.clone(),
            RegistrationState::Registered,
        )
    });

    record.phone_number = Some(phone.to_string());
    record.state = RegistrationState::Registered;
    record.updated_at = Utc::now();

    Transition {
        reply: format!(
            "Thank you for sharing your phone number, {}!",
            sender.display_name
        ),
        record,
        request_contact: false,
        persist: true,
    }
}

fn phone_request(name: &str) -> String {
    format!("Welcome {name}! Please share your phone number to complete registration.")
}
