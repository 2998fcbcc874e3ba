mod client;
mod types;

pub use client::{ApiErrorClass, ImmichClient, ImmichError};
pub use types::{
    AlbumAsset, AlbumDetail, AlbumSummary, AssetPage, AssetRecord, AssetType, BulkIdResult,
    Person, PersonRef,
};
