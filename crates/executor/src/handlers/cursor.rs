//! Result set command handlers

use distkv_core::Result;
use distkv_engine::ResultSet;

use crate::command::CursorOp;
use crate::Output;

/// Apply a cursor operation to a result set
pub fn cursor(rs: &ResultSet, op: CursorOp) -> Result<Output> {
    let out = match op {
        CursorOp::GetCount => Output::Count(rs.get_count()),
        CursorOp::GetPosition => Output::Position(rs.get_position()),
        CursorOp::MoveToFirst => Output::Bool(rs.move_to_first()),
        CursorOp::MoveToLast => Output::Bool(rs.move_to_last()),
        CursorOp::MoveToNext => Output::Bool(rs.move_to_next()),
        CursorOp::MoveToPrevious => Output::Bool(rs.move_to_previous()),
        CursorOp::Move(offset) => Output::Bool(rs.move_by(offset)),
        CursorOp::MoveToPosition(position) => Output::Bool(rs.move_to_position(position)),
        CursorOp::IsFirst => Output::Bool(rs.is_first()),
        CursorOp::IsLast => Output::Bool(rs.is_last()),
        CursorOp::IsBeforeFirst => Output::Bool(rs.is_before_first()),
        CursorOp::IsAfterLast => Output::Bool(rs.is_after_last()),
        CursorOp::GetEntry => Output::Entry(rs.get_entry()?),
    };
    Ok(out)
}
