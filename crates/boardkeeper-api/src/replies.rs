//! Replies sent back to the chat for each handled input

use boardkeeper_util::{format_display, BoardId, UserId};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Board, DurationError, RentalRecord, SessionInfo};

const SEPARATOR: &str = "───────────────";

/// One page of ledger history, newest first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPage {
    pub entries: Vec<RentalRecord>,
    /// Matching records left out of `entries`
    pub suppressed: usize,
}

/// User-visible outcome of a chat input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reply {
    Welcome { name: String },
    Help { board_ids: Vec<BoardId> },
    NotAuthorized,

    // Booking dialogue
    ChooseBoard { boards: Vec<Board> },
    UnknownBoard { board_id: BoardId },
    EnterDuration { min_hours: f64 },
    InvalidDuration { error: DurationError },
    ConfirmRental { board_name: String, hours: f64, cost: f64 },
    RentalStarted {
        board_name: String,
        admin_name: String,
        admin_id: UserId,
        ends_at: DateTime<Local>,
        cost: f64,
    },
    RentalCancelled,
    BoardBusy { board_id: BoardId, ends_at: DateTime<Local> },
    PersistenceFailed,

    // Forced termination
    EnterBoardId { board_ids: Vec<BoardId> },
    RentalForceEnded { board_name: String },
    NoActiveRental { board_id: BoardId },

    // Queries
    Status { sessions: Vec<SessionInfo> },
    NoActiveRentals,
    ExportLink { url: String },
    MirrorUnavailable,
    History(HistoryPage),
    HistoryEmpty,
    HistoryUnavailable,
    InvalidHistoryFilter { reason: String },

    /// Input that fits no command and no open dialogue step
    Unexpected,
}

fn join_ids(ids: &[BoardId]) -> String {
    ids.iter().map(BoardId::as_str).collect::<Vec<_>>().join(", ")
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Welcome { name } => {
                write!(f, "Hello, {name}!\nUse /help to see the list of commands.")
            }
            Reply::Help { board_ids } => {
                writeln!(f, "Administrator commands:\n")?;
                writeln!(f, "/start - welcome message")?;
                writeln!(f, "/help - show this menu")?;
                writeln!(f, "/rent - start a new rental (choose board and duration)")?;
                writeln!(f, "/status - list active rentals")?;
                writeln!(f, "/end <board id> - end a rental early. Boards: [{}]", join_ids(board_ids))?;
                writeln!(f, "/export - link to the rental spreadsheet")?;
                writeln!(f, "/history - full history")?;
                writeln!(f, "/history board=1 - history of board 1 only")?;
                write!(f, "/history admin=123456789 - rentals issued by admin 123456789 only")
            }
            Reply::NotAuthorized => write!(f, "You do not have administrator rights."),
            Reply::ChooseBoard { boards } => {
                write!(f, "Choose a board:")?;
                for board in boards {
                    write!(f, "\n[{}] {}", board.id, board.name)?;
                }
                Ok(())
            }
            Reply::UnknownBoard { board_id } => {
                write!(f, "Board `{board_id}` is not in the catalog. Choose a board from the list.")
            }
            Reply::EnterDuration { min_hours } => write!(
                f,
                "Enter the rental duration in hours, minimum {min_hours}:"
            ),
            Reply::InvalidDuration { error } => write!(f, "{error}"),
            Reply::ConfirmRental {
                board_name,
                hours,
                cost,
            } => write!(
                f,
                "You selected {board_name} for {hours} h.\nCost: {cost:.2}\n\nConfirm payment:"
            ),
            Reply::RentalStarted {
                board_name,
                admin_name,
                admin_id,
                ends_at,
                cost,
            } => write!(
                f,
                "Rental of {board_name} started!\nIssued by: {admin_name} (ID: {admin_id})\nReturn by: {}\nCost: {cost:.2}",
                format_display(ends_at)
            ),
            Reply::RentalCancelled => write!(f, "Rental cancelled."),
            Reply::BoardBusy { board_id, ends_at } => write!(
                f,
                "Board `{board_id}` is already rented until {}. Rental not started.",
                format_display(ends_at)
            ),
            Reply::PersistenceFailed => {
                write!(f, "Could not record the rental. Nothing was started, please try again.")
            }
            Reply::EnterBoardId { board_ids } => {
                write!(f, "Enter the board ID (for example: {}):", join_ids(board_ids))
            }
            Reply::RentalForceEnded { board_name } => {
                write!(f, "Rental of {board_name} ended early.")
            }
            Reply::NoActiveRental { board_id } => {
                write!(f, "No active rental found for board `{board_id}`.")
            }
            Reply::Status { sessions } => {
                write!(f, "Active rentals:")?;
                for session in sessions {
                    write!(
                        f,
                        "\nAdmin: {}\nAdmin ID: {}\nBoard: {}\nBoard ID: {}\nReturn by: {}\n{SEPARATOR}",
                        session.admin_name,
                        session.admin_id,
                        session.board_name,
                        session.board_id,
                        format_display(&session.ends_at)
                    )?;
                }
                Ok(())
            }
            Reply::NoActiveRentals => write!(f, "No active rentals."),
            Reply::ExportLink { url } => write!(f, "Rental spreadsheet: {url}"),
            Reply::MirrorUnavailable => write!(f, "The rental spreadsheet is not configured."),
            Reply::History(page) => {
                writeln!(f, "Rental history:")?;
                for entry in &page.entries {
                    write!(
                        f,
                        "\nCustomer: {}\nBoard: {}; id=({})\nAdmin: {} (ID: {})\nStart: {}\nDuration: {:.2} h\nCost: {:.2}\n{SEPARATOR}",
                        entry.user_id,
                        entry.board_name,
                        entry.board_id,
                        entry.admin_name,
                        entry.admin_id,
                        format_display(&entry.start_time),
                        entry.duration_hours,
                        entry.cost
                    )?;
                }
                if page.suppressed > 0 {
                    write!(
                        f,
                        "\n\n... and {} more records. Use filters to narrow the search.",
                        page.suppressed
                    )?;
                }
                Ok(())
            }
            Reply::HistoryEmpty => write!(f, "No records match your query."),
            Reply::HistoryUnavailable => write!(f, "Rental history is unavailable right now."),
            Reply::InvalidHistoryFilter { reason } => write!(f, "Invalid filter: {reason}"),
            Reply::Unexpected => write!(f, "Unrecognized input. Use /help to see the list of commands."),
        }
    }
}
