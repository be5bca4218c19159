pub mod display;
pub mod lesson;
pub mod parser;

pub use display::format_for_display;
pub use lesson::{event_icon, infer_lesson_type};
pub use parser::{CalendarEvent, IcsParser, OffsetPolicy};
