/*
 * This module provides the application logic layer, centered around
 * `StencilEditorLogic`, which turns operator requests into editing-session
 * operations and queues commands and confirmation requests for whatever UI is
 * attached. Unit tests for `StencilEditorLogic` are in `handler_tests.rs`.
 */
pub mod confirmation;
pub mod handler;


pub use confirmation::{ConfirmationId, ConfirmationQueue, ConfirmationRequest, PendingAction};
pub use handler::{EditorCommand, EditorError, MessageSeverity, Notification, StencilEditorLogic};
