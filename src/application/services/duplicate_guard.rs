use crate::domain::models::{Broadcast, MessagePayload};

/// Advisory check used before broadcast creation: flags a new message whose
/// template text equals the previous broadcast's. The dispatcher itself never
/// consults this; it only feeds a warning back to the caller.
pub fn is_duplicate(new_payload: &MessagePayload, last: &Broadcast) -> bool {
    match (new_payload.template_text(), last.message.template_text()) {
        (Some(new_text), Some(last_text)) => new_text == last_text,
        _ => false,
    }
}
