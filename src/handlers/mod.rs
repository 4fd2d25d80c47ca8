// handlers/mod.rs - Handlers grouped by access tier
//
// Public (no auth) → Protected (student / teacher JWT) → Elevated (admin JWT)
pub mod elevated;
pub mod protected;
pub mod public;
