use crate::domain::{
    Attachment, ContentPart, ConversationTurn, FileRef, ImageRef, Message, MessageContent, Role,
};

/// Prefixes a user message with the student's grade-level marker.
pub fn wrap_user_turn(text: &str, grade_level_range: &str) -> String {
    format!("[Student Grade Level: {grade_level_range}]\n\n{text}")
}

/// Converts an attachment into an outbound content part. Only images and
/// PDFs are forwarded; anything else yields `None`.
pub fn attachment_part(attachment: &Attachment) -> Option<ContentPart> {
    if attachment.is_image() {
        Some(ContentPart::ImageUrl {
            image_url: ImageRef {
                url: attachment.encoded_data.clone(),
            },
        })
    } else if attachment.is_pdf() {
        Some(ContentPart::File {
            file: FileRef {
                filename: attachment.name.clone(),
                file_data: attachment.encoded_data.clone(),
            },
        })
    } else {
        None
    }
}

fn user_content(turn: &ConversationTurn, grade_level_range: &str) -> MessageContent {
    if turn.attachments().is_empty() {
        return MessageContent::Text(wrap_user_turn(turn.content(), grade_level_range));
    }

    let mut parts = Vec::with_capacity(turn.attachments().len() + 1);
    if !turn.content().is_empty() {
        parts.push(ContentPart::Text {
            text: wrap_user_turn(turn.content(), grade_level_range),
        });
    }
    parts.extend(turn.attachments().iter().filter_map(attachment_part));
    MessageContent::Parts(parts)
}

/// Builds the outbound message list: the grade-level system prompt followed
/// by the conversation in order. Client-supplied system turns are dropped.
pub fn assemble_messages(
    system_prompt: &str,
    history: &[ConversationTurn],
    grade_level_range: &str,
) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(Message::text(Role::System, system_prompt));

    for turn in history {
        match turn.role() {
            Role::User => messages.push(Message {
                role: Role::User,
                content: user_content(turn, grade_level_range),
            }),
            Role::Assistant => messages.push(Message::text(Role::Assistant, turn.content())),
            Role::System => {}
        }
    }

    messages
}
