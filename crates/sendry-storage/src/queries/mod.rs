// SPDX-FileCopyrightText: 2026 Sendry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules, one per entity family.

pub mod accounts;
pub mod moderation;
pub mod tasks;

/// Wrap a text-column conversion failure (enum parse, timestamp parse) as a
/// rusqlite error so it propagates through the connection call.
pub(crate) fn invalid_text<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}
