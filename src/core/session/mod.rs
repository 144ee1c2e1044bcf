pub mod attendance_flow;
pub mod email_action;

pub use attendance_flow::{AttendanceSessions, AttendanceStep, FlowReply};
pub use email_action::{EmailAction, EmailButton};
