//! The tools the model can call.

mod create_ticket;
mod schedule_followup;
mod search_kb;

pub use create_ticket::CreateTicketTool;
pub use schedule_followup::ScheduleFollowupTool;
pub use search_kb::{DEFAULT_TOP_K, MAX_TOP_K, SNIPPET_CHARS, SearchKbTool};
