//! Stage transition engine — the fixed-order qualification questionnaire.
//!
//! Progresses linearly: AwaitingFamilySize → AwaitingIncome → AwaitingGender →
//! Completing. `transition` is a pure function of (stage, normalized input);
//! nothing here performs I/O.

use serde::{Deserialize, Serialize};

pub const GREETING: &str = "Hi there! Are you looking for a health insurance plan?";
pub const ASK_FAMILY_SIZE: &str = "Great! Let's start. What's your family size?";
pub const DECLINED: &str = "Alright, feel free to ask me anything else!";
pub const ASK_INCOME: &str = "Thanks! What's your household income?";
pub const REPROMPT_FAMILY_SIZE: &str = "Could you please provide your family size in numbers?";
pub const ASK_GENDER: &str = "Got it! Lastly, can you share your gender (male/female/other)?";
pub const REPROMPT_INCOME: &str = "Please provide your household income in numbers.";
pub const THANK_YOU: &str =
    "Thank you for providing the information! We'll get back to you with the best insurance plans.";
pub const REPROMPT_GENDER: &str = "Please specify your gender as male, female, or other.";

/// The in-progress stages of the questionnaire.
///
/// Each stage names the answer it is waiting on. `Completing` is the explicit
/// final confirmation step: the gender question has been asked and the flow
/// terminates once a valid answer arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    AwaitingFamilySize,
    AwaitingIncome,
    AwaitingGender,
    Completing,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::AwaitingFamilySize => "awaiting_family_size",
            Self::AwaitingIncome => "awaiting_income",
            Self::AwaitingGender => "awaiting_gender",
            Self::Completing => "completing",
        };
        write!(f, "{s}")
    }
}

/// One engine step: the reply to send and the stage to store.
///
/// `next` of `None` means the flow has terminated; subsequent messages from
/// the user belong to the assistant fallback, not the questionnaire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Turn {
    pub reply: &'static str,
    pub next: Option<Stage>,
}

/// Run one step of the questionnaire.
///
/// `stage` of `None` means the user has not been greeted yet. `text` must
/// already be trimmed and lower-cased; empty input fails every validation
/// check and produces the stage's re-prompt, never a panic.
pub fn transition(stage: Option<Stage>, text: &str) -> Turn {
    match stage {
        None => Turn {
            reply: GREETING,
            next: Some(Stage::AwaitingFamilySize),
        },
        Some(Stage::AwaitingFamilySize) => {
            if text.contains("yes") {
                Turn {
                    reply: ASK_FAMILY_SIZE,
                    next: Some(Stage::AwaitingIncome),
                }
            } else {
                Turn {
                    reply: DECLINED,
                    next: None,
                }
            }
        }
        Some(Stage::AwaitingIncome) => {
            if is_all_digits(text) {
                Turn {
                    reply: ASK_INCOME,
                    next: Some(Stage::AwaitingGender),
                }
            } else {
                Turn {
                    reply: REPROMPT_FAMILY_SIZE,
                    next: stage,
                }
            }
        }
        Some(Stage::AwaitingGender) => {
            if is_all_digits(text) {
                Turn {
                    reply: ASK_GENDER,
                    next: Some(Stage::Completing),
                }
            } else {
                Turn {
                    reply: REPROMPT_INCOME,
                    next: stage,
                }
            }
        }
        Some(Stage::Completing) => {
            if matches!(text, "male" | "female" | "other") {
                Turn {
                    reply: THANK_YOU,
                    next: None,
                }
            } else {
                Turn {
                    reply: REPROMPT_GENDER,
                    next: stage,
                }
            }
        }
    }
}

/// One or more ASCII decimal digits and nothing else.
fn is_all_digits(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greeting_always_advances() {
        for input in ["hello", "", "buy me a plan", "yes"] {
            let turn = transition(None, input);
            assert_eq!(turn.reply, GREETING);
            assert_eq!(turn.next, Some(Stage::AwaitingFamilySize));
        }
    }

    #[test]
    fn happy_path_reaches_thank_you() {
        let inputs = ["hi", "yes", "3", "50000", "male"];
        let expected = [GREETING, ASK_FAMILY_SIZE, ASK_INCOME, ASK_GENDER, THANK_YOU];

        let mut stage = None;
        let mut replies = Vec::new();
        for input in inputs {
            let turn = transition(stage, input);
            replies.push(turn.reply);
            stage = turn.next;
        }

        assert_eq!(replies, expected);
        assert_eq!(stage, None, "flow should terminate after the gender answer");
    }

    #[test]
    fn decline_terminates() {
        let turn = transition(None, "anything");
        let turn = transition(turn.next, "no thanks");
        assert_eq!(turn.reply, DECLINED);
        assert_eq!(turn.next, None);
    }

    #[test]
    fn yes_substring_is_accepted() {
        let turn = transition(Some(Stage::AwaitingFamilySize), "yes please");
        assert_eq!(turn.next, Some(Stage::AwaitingIncome));
        let turn = transition(Some(Stage::AwaitingFamilySize), "oh yes!");
        assert_eq!(turn.next, Some(Stage::AwaitingIncome));
    }

    #[test]
    fn non_numeric_family_size_reprompts() {
        let turn = transition(Some(Stage::AwaitingIncome), "abc");
        assert_eq!(turn.reply, REPROMPT_FAMILY_SIZE);
        assert_eq!(turn.next, Some(Stage::AwaitingIncome), "stage unchanged");
    }

    #[test]
    fn non_numeric_income_reprompts() {
        for input in ["lots", "12k", "3.5", "-2", ""] {
            let turn = transition(Some(Stage::AwaitingGender), input);
            assert_eq!(turn.reply, REPROMPT_INCOME);
            assert_eq!(turn.next, Some(Stage::AwaitingGender));
        }
    }

    #[test]
    fn gender_must_match_exactly() {
        for input in ["man", "malex", "female please", ""] {
            let turn = transition(Some(Stage::Completing), input);
            assert_eq!(turn.reply, REPROMPT_GENDER);
            assert_eq!(turn.next, Some(Stage::Completing));
        }
        for input in ["male", "female", "other"] {
            let turn = transition(Some(Stage::Completing), input);
            assert_eq!(turn.reply, THANK_YOU);
            assert_eq!(turn.next, None);
        }
    }

    #[test]
    fn empty_input_fails_every_validation() {
        // At the yes/no step an empty answer counts as a decline.
        let turn = transition(Some(Stage::AwaitingFamilySize), "");
        assert_eq!(turn.reply, DECLINED);
        assert_eq!(turn.next, None);

        // At every later step it re-prompts and keeps the stage.
        for stage in [Stage::AwaitingIncome, Stage::AwaitingGender, Stage::Completing] {
            let turn = transition(Some(stage), "");
            assert_eq!(turn.next, Some(stage));
        }
    }

    #[test]
    fn transition_is_pure() {
        let a = transition(Some(Stage::AwaitingIncome), "4");
        let b = transition(Some(Stage::AwaitingIncome), "4");
        assert_eq!(a, b);
    }

    #[test]
    fn is_all_digits_edge_cases() {
        assert!(is_all_digits("0"));
        assert!(is_all_digits("50000"));
        assert!(!is_all_digits(""));
        assert!(!is_all_digits("5 0"));
        assert!(!is_all_digits("５０"), "full-width digits are not accepted");
        assert!(!is_all_digits("1e5"));
    }
}
