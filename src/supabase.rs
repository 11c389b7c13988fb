//! Supabase (PostgREST) storage adapters.
//!
//! All three stores share one [`SupabaseClient`]:
//!
//! - [`SupabaseVectorIndex`] ranks through a similarity RPC over the
//!   embedding table.
//! - [`SupabaseKeywordIndex`] ranks through a full-text RPC over the same
//!   table's `fts_text` column, with query tokens AND-joined.
//! - [`SupabaseProductStore`] reads and writes the product table.

pub mod client;
pub mod keyword;
pub mod products;
pub mod vector;

pub use client::{SupabaseClient, SupabaseConfig};
pub use keyword::SupabaseKeywordIndex;
pub use products::SupabaseProductStore;
pub use vector::SupabaseVectorIndex;
