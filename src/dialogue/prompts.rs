//! User-facing texts for the intake dialogue.
//!
//! Markdown uses Telegram's legacy `*bold*` syntax; transports that cannot
//! render it show the asterisks verbatim.

use crate::students::StudentRecord;

use super::state::{MAX_AGE, MIN_AGE};

/// Typed cancel answer, matched case-insensitively. Also the label of
/// every cancel button.
pub const CANCEL_TOKEN: &str = "cancel";
pub const CANCEL_LABEL: &str = "Cancel";
pub const CONFIRM_LABEL: &str = "Confirm";

pub const START: &str = "\
Hi, student!
Please answer the following three questions:

*1. What is your name? (full name)*";

pub const RESTART: &str = "Let's update your details. *What is your name? (full name)*";

pub const NAME_REQUIRED: &str = "Please enter your name.";

pub const ASK_AGE: &str = "*2. How old are you?*";

pub const AGE_NOT_A_NUMBER: &str = "Please enter a valid age (a number).";

pub const ASK_GRADE: &str = "*3. Which grade are you in? (pick a number)*";

pub const CANCELLED: &str = "Data entry cancelled.";

pub const SAVED: &str = "Your details have been saved.";

pub const SAVE_FAILED: &str =
    "Something went wrong while saving your details. Press *Confirm* to try again.";

pub const STORAGE_FAILED: &str = "Something went wrong. Please try again later.";

pub const NOTHING_TO_CONFIRM: &str =
    "This form is no longer active. Send */start* to fill it in again.";

pub const USE_BUTTONS: &str = "Please use the *Confirm* or *Cancel* buttons above, \
     or send */help* for the list of commands.";

pub const NO_RECORD: &str = "You have *not provided your details yet*. Send */start* to begin.";

pub const DELETED: &str = "*Your details have been deleted.*";

pub const HELP: &str = "\
I collect information about students.
*Commands:*
/start - start entering your details
/profile - view your details
/update - update your details
/delete - delete your details
/cancel - cancel data entry
/help - show this help";

pub const FALLBACK: &str =
    "*Sorry, I don't understand that message.* Send */help* for the list of commands.";

/// Bot command menu: `(command, description)`.
pub const COMMANDS: &[(&str, &str)] = &[
    ("start", "Start entering your details"),
    ("profile", "View your details"),
    ("update", "Update your details"),
    ("delete", "Delete your details"),
    ("cancel", "Cancel data entry"),
    ("help", "Show help"),
];

/// Whether a typed answer is the cancel token.
pub fn is_cancel(text: &str) -> bool {
    text.to_lowercase() == CANCEL_TOKEN
}

pub fn age_out_of_range() -> String {
    format!("Please enter a real age between {MIN_AGE} and {MAX_AGE}.")
}

/// Summary shown before the user confirms or cancels.
pub fn summary(name: &str, age: u8, grade: &str) -> String {
    format!(
        "*Please check your details:*\n*Name:* {name}\n*Age:* {age}\n*Grade:* {grade}"
    )
}

/// Rendering of a stored record for `/profile`.
pub fn record(record: &StudentRecord) -> String {
    format!(
        "*Your details:*\n*Name:* {}\n*Age:* {}\n*Grade:* {}",
        record.name, record.age, record.grade
    )
}
