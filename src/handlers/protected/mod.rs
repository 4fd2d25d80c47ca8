// handlers/protected/mod.rs - Handlers behind a STUDENT or TEACHER token
//
// The ids the handlers act on come from the token claims, never from the path
// alone: a student only sees their own ledger, a teacher only grades their
// own groups.
pub mod student;
pub mod teacher;
