use rand::Rng;

use crate::domain::models::{BroadcastContact, MessagePayload};

/// Renders a message template for one recipient: Spintax alternatives are
/// resolved first, then `{name}` / `{number}` variables are substituted.
///
/// Variable substitution replaces every occurrence of a token. `{name}` falls
/// back to the recipient's number when no display name is known.
pub fn render<R: Rng>(template: &str, contact: &BroadcastContact, rng: &mut R) -> String {
    let spun = resolve_spintax(template, rng);
    spun.replace("{name}", contact.display_name())
        .replace("{number}", &contact.number)
}

/// Applies `render` to the parts of a payload that carry template text:
/// the body of a text message, the caption of a media message. Location,
/// poll and vcard payloads pass through untouched.
pub fn render_payload<R: Rng>(
    payload: &MessagePayload,
    contact: &BroadcastContact,
    rng: &mut R,
) -> MessagePayload {
    match payload {
        MessagePayload::Text { body } => MessagePayload::Text {
            body: render(body, contact, rng),
        },
        MessagePayload::Image { file, caption } => MessagePayload::Image {
            file: file.clone(),
            caption: caption.as_deref().map(|c| render(c, contact, rng)),
        },
        MessagePayload::Video { file, caption } => MessagePayload::Video {
            file: file.clone(),
            caption: caption.as_deref().map(|c| render(c, contact, rng)),
        },
        MessagePayload::Document { file, caption } => MessagePayload::Document {
            file: file.clone(),
            caption: caption.as_deref().map(|c| render(c, contact, rng)),
        },
        other => other.clone(),
    }
}

/// Resolves `{a|b|c}` blocks by picking one alternative at random, innermost
/// block first so nested spintax works. Blocks without a `|` are variable
/// tokens, not spintax: the scan treats them as atomic, so `{Hi {name}|Hello}`
/// still resolves around them. An unterminated `{` never loops: the scan
/// simply finds no block and the text is returned as-is.
fn resolve_spintax<R: Rng>(template: &str, rng: &mut R) -> String {
    let mut text = template.to_string();

    while let Some((open, close)) = find_spintax_block(&text) {
        let inner = &text[open + 1..close];
        let options: Vec<&str> = inner.split('|').collect();
        let choice = options[rng.gen_range(0..options.len())].to_string();
        text.replace_range(open..=close, &choice);
    }

    text
}

/// First `{...}` pair whose content holds a `|`, innermost first. Pipe-less
/// pairs are closed and dropped without discarding the opens that enclose
/// them. Any nested pairs left inside the returned block are pipe-less, so
/// splitting its content on `|` is safe.
fn find_spintax_block(text: &str) -> Option<(usize, usize)> {
    let mut opens: Vec<usize> = Vec::new();
    for (idx, byte) in text.as_bytes().iter().enumerate() {
        match byte {
            b'{' => opens.push(idx),
            b'}' => {
                if let Some(open) = opens.pop() {
                    if text[open + 1..idx].contains('|') {
                        return Some((open, idx));
                    }
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use uuid::Uuid;

    use super::*;
    use crate::domain::models::{ContactStatus, MediaFile};

    fn contact(name: Option<&str>, number: &str) -> BroadcastContact {
        let now = Utc::now();
        BroadcastContact {
            id: Uuid::new_v4(),
            broadcast_id: Uuid::new_v4(),
            position: 0,
            number: number.to_string(),
            name: name.map(str::to_string),
            status: ContactStatus::Pending,
            error: None,
            scheduled_at: None,
            send_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn spintax_picks_one_alternative() {
        let c = contact(Some("Ana"), "551199");
        for seed in 0..32 {
            let mut rng = StdRng::seed_from_u64(seed);
            let out = render("Hi {A|B}", &c, &mut rng);
            assert!(out == "Hi A" || out == "Hi B", "unexpected render: {out}");
        }
    }

    #[test]
    fn nested_spintax_resolves_fully() {
        let c = contact(Some("Ana"), "551199");
        for seed in 0..64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let out = render("{Good {morning|evening}|Hello} {name}", &c, &mut rng);
            assert!(!out.contains('{') && !out.contains('}'), "braces left: {out}");
            assert!(out.ends_with("Ana"));
        }
    }

    #[test]
    fn variable_token_inside_spintax_block_resolves() {
        let c = contact(Some("Ana"), "551199");
        for seed in 0..64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let out = render("{Hi {name}|Hello}", &c, &mut rng);
            assert!(out == "Hi Ana" || out == "Hello", "braces leaked: {out}");
        }
    }

    #[test]
    fn unterminated_brace_is_left_alone() {
        let c = contact(Some("Ana"), "551199");
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(render("broken {a|b", &c, &mut rng), "broken {a|b");
    }

    #[test]
    fn variables_replace_all_occurrences() {
        let c = contact(Some("Ana"), "551199");
        let mut rng = StdRng::seed_from_u64(1);
        let out = render("{name} {name}, your number is {number} ({number})", &c, &mut rng);
        assert_eq!(out, "Ana Ana, your number is 551199 (551199)");
    }

    #[test]
    fn name_falls_back_to_number() {
        let c = contact(None, "551199");
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(render("Hi {name}", &c, &mut rng), "Hi 551199");
    }

    #[test]
    fn spintax_runs_before_variables() {
        // the renderer must not treat {name} as a spintax block
        let c = contact(Some("Ana"), "551199");
        for seed in 0..16 {
            let mut rng = StdRng::seed_from_u64(seed);
            let out = render("{name}: {yes|no}", &c, &mut rng);
            assert!(out == "Ana: yes" || out == "Ana: no");
        }
    }

    #[test]
    fn media_caption_is_rendered_and_location_passes_through() {
        let c = contact(Some("Ana"), "551199");
        let mut rng = StdRng::seed_from_u64(3);
        let image = MessagePayload::Image {
            file: MediaFile {
                reference: "media/1".into(),
                mime_type: "image/png".into(),
                file_name: None,
            },
            caption: Some("For {name}".into()),
        };
        match render_payload(&image, &c, &mut rng) {
            MessagePayload::Image { caption, .. } => {
                assert_eq!(caption.as_deref(), Some("For Ana"));
            }
            other => panic!("unexpected payload: {other:?}"),
        }

        let location = MessagePayload::Location {
            latitude: 1.0,
            longitude: 2.0,
            label: Some("{name}".into()),
        };
        assert_eq!(render_payload(&location, &c, &mut rng), location);
    }
}
