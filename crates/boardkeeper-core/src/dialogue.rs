//! Booking dialogue state machine
//!
//! Each administrator has an independent dialogue. `Idle` is represented by
//! the absence of an entry: entries are created by a privileged action and
//! removed on every terminal transition.

use boardkeeper_api::{Board, ChatInput, DurationError, Reply};
use boardkeeper_config::{BoardCatalog, RentalPolicy};
use boardkeeper_util::{BoardId, UserId};
use std::collections::HashMap;
use tracing::debug;

use crate::{RentalError, RentalResult};

/// A fully specified booking awaiting commit
#[derive(Debug, Clone, PartialEq)]
pub struct BookingDraft {
    pub board: Board,
    pub hours: f64,
    pub cost: f64,
}

/// Non-idle dialogue steps
#[derive(Debug, Clone, PartialEq)]
pub enum DialogueStep {
    ChoosingBoard,
    EnteringHours { board: Board },
    Confirming(BookingDraft),
    AwaitingForceEndId,
}

/// What the caller must do after a dialogue input
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Nothing to commit; send this reply
    Reply(Reply),
    /// Confirmed booking; the dialogue is already back to idle
    Commit(BookingDraft),
    /// Board id entered for forced termination; the dialogue is already back to idle
    ForceEnd(BoardId),
}

/// Parse a duration in hours and check it against the policy limits
pub fn parse_hours(text: &str, policy: &RentalPolicy) -> Result<f64, DurationError> {
    let hours: f64 = text.trim().parse().map_err(|_| DurationError::NotANumber)?;
    if !hours.is_finite() {
        return Err(DurationError::NotANumber);
    }
    if hours < policy.min_hours {
        return Err(DurationError::TooShort {
            min_hours: policy.min_hours,
        });
    }
    if hours > policy.max_hours {
        return Err(DurationError::TooLong {
            max_hours: policy.max_hours,
        });
    }
    Ok(hours)
}

fn select_board(catalog: &BoardCatalog, board_id: &BoardId) -> RentalResult<Board> {
    catalog
        .get(board_id)
        .cloned()
        .ok_or_else(|| RentalError::UnknownBoard(board_id.clone()))
}

/// Per-administrator dialogue table
#[derive(Debug, Default)]
pub struct DialogueTable {
    steps: HashMap<UserId, DialogueStep>,
}

impl DialogueTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current step, `None` when idle
    pub fn step(&self, user: UserId) -> Option<&DialogueStep> {
        self.steps.get(&user)
    }

    /// Number of administrators with an open dialogue
    pub fn open_count(&self) -> usize {
        self.steps.len()
    }

    /// Start (or restart) a booking
    pub fn begin_rental(&mut self, user: UserId, catalog: &BoardCatalog) -> Reply {
        self.set(user, DialogueStep::ChoosingBoard);
        Reply::ChooseBoard {
            boards: catalog.boards().to_vec(),
        }
    }

    /// Ask for the board whose rental should end early
    pub fn begin_force_end(&mut self, user: UserId, catalog: &BoardCatalog) -> Reply {
        self.set(user, DialogueStep::AwaitingForceEndId);
        Reply::EnterBoardId {
            board_ids: catalog.ids(),
        }
    }

    /// Return the dialogue to idle
    pub fn reset(&mut self, user: UserId) {
        if self.steps.remove(&user).is_some() {
            debug!(user_id = %user, "Dialogue reset");
        }
    }

    /// Feed a non-command input into the caller's dialogue
    pub fn advance(
        &mut self,
        user: UserId,
        input: &ChatInput,
        catalog: &BoardCatalog,
        policy: &RentalPolicy,
    ) -> Transition {
        let Some(step) = self.steps.get(&user).cloned() else {
            return Transition::Reply(Reply::Unexpected);
        };

        if matches!(input, ChatInput::Cancel) {
            self.reset(user);
            return Transition::Reply(Reply::RentalCancelled);
        }

        match step {
            DialogueStep::ChoosingBoard => {
                let board_id = match input {
                    ChatInput::SelectBoard { board_id } => board_id.clone(),
                    ChatInput::Text { text } => BoardId::new(text.trim()),
                    _ => {
                        return Transition::Reply(Reply::ChooseBoard {
                            boards: catalog.boards().to_vec(),
                        })
                    }
                };

                match select_board(catalog, &board_id) {
                    Ok(board) => {
                        self.set(user, DialogueStep::EnteringHours { board });
                        Transition::Reply(Reply::EnterDuration {
                            min_hours: policy.min_hours,
                        })
                    }
                    Err(e) => Transition::Reply(e.into_reply()),
                }
            }

            DialogueStep::EnteringHours { board } => {
                let ChatInput::Text { text } = input else {
                    return Transition::Reply(Reply::EnterDuration {
                        min_hours: policy.min_hours,
                    });
                };

                match parse_hours(text, policy) {
                    Ok(hours) => {
                        let draft = BookingDraft {
                            cost: policy.cost_for(hours),
                            board,
                            hours,
                        };
                        let reply = Reply::ConfirmRental {
                            board_name: draft.board.name.clone(),
                            hours: draft.hours,
                            cost: draft.cost,
                        };
                        self.set(user, DialogueStep::Confirming(draft));
                        Transition::Reply(reply)
                    }
                    Err(e) => Transition::Reply(RentalError::from(e).into_reply()),
                }
            }

            DialogueStep::Confirming(draft) => match input {
                ChatInput::Confirm => {
                    self.reset(user);
                    Transition::Commit(draft)
                }
                _ => Transition::Reply(Reply::ConfirmRental {
                    board_name: draft.board.name,
                    hours: draft.hours,
                    cost: draft.cost,
                }),
            },

            DialogueStep::AwaitingForceEndId => {
                let board_id = match input {
                    ChatInput::SelectBoard { board_id } => board_id.clone(),
                    ChatInput::Text { text } => BoardId::new(text.trim()),
                    _ => {
                        return Transition::Reply(Reply::EnterBoardId {
                            board_ids: catalog.ids(),
                        })
                    }
                };
                self.reset(user);
                Transition::ForceEnd(board_id)
            }
        }
    }

    fn set(&mut self, user: UserId, step: DialogueStep) {
        debug!(user_id = %user, step = ?step, "Dialogue step");
        self.steps.insert(user, step);
    }
}
