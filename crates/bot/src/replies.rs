//! User- and staff-facing reply texts. Kept in one place so wording stays
//! consistent across dispatcher branches.

pub const GREETING: &str = "Hi! Tap the button below to write to the team. \
We read everything and reply here when there is something to say.";

pub const EMPTY_FEEDBACK: &str =
    "The message is empty. Please send some text for the team.";

pub const SENT_OK: &str = "Your message has been sent. Thank you!";

pub const SENT_FAIL: &str =
    "Your message could not be delivered right now. Please try again later.";

pub const UNRECOGNIZED: &str =
    "I did not understand that. Tap the button below to write to the team.";

pub const BLOCKED: &str = "You have been blocked from sending messages to the team.";

pub const TRY_LATER: &str = "Something went wrong on our side. Please try again later.";

pub const TARGET_NOT_FOUND: &str =
    "Target not found: the original sender of this message is no longer known.";

pub const BAN_DONE: &str = "User has been banned.";
pub const BAN_NOT_FOUND: &str = "Cannot ban: no such user on record.";
pub const UNBAN_DONE: &str = "User has been unbanned.";
pub const UNBAN_NOT_FOUND: &str = "Cannot unban: no such user on record.";
pub const ACTION_FAILED: &str = "The action could not be completed. Please try again later.";

pub const REPLY_DELIVERED: &str = "Reply delivered.";
pub const REPLY_FAILED: &str = "Reply could not be delivered to the user.";

/// Fixed marker prepended to staff replies routed back to a user.
pub const STAFF_REPLY_MARKER: &str = "\u{2709}\u{fe0f} Reply from the team:";

pub fn ask_feedback(max_len: u32) -> String {
    format!("Write your message below. One message, up to {max_len} characters.")
}

pub fn rate_limited(minutes: u64) -> String {
    format!(
        "You have already written recently. Please wait about {minutes} minute(s) \
before sending another message."
    )
}

pub fn too_long(length: usize, max_len: u32) -> String {
    format!(
        "The message is too long: {length} characters, the maximum is {max_len}. \
Please shorten it and send again."
    )
}

pub fn chat_info(chat_id: i64, kind: &str, title: &str) -> String {
    format!("chat id: {chat_id}\ntype: {kind}\ntitle: {title}")
}

pub fn staff_reply(text: &str) -> String {
    format!("{STAFF_REPLY_MARKER}\n\n{text}")
}
