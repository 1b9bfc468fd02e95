/*
 * Stencil editing core: linting, a virtual file tree over path-addressed
 * records, a multi-document editing session, and version history with diff
 * and restore. `core` holds the platform-agnostic domain logic; `app_logic`
 * drives it on behalf of an operator-facing UI.
 */
pub mod app_logic;
pub mod core;
