// handlers/elevated/mod.rs - Handlers behind an ADMIN token
//
// Route Prefix: /api/admin/*
pub mod catalog;
pub mod students;
pub mod system;
