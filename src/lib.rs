//! Discovery, placeholder lifecycle and masonry layout for a numbered
//! photo/video gallery. The host UI feeds commands in and renders the
//! [`events::GalleryEvent`]s that come back out.

pub mod asset;
pub mod config;
pub mod error;
pub mod events;
pub mod gallery;
pub mod probe;
pub mod processing {
    pub mod dimensions;
    pub mod layout;
    pub mod visibility;
}
pub mod tasks {
    pub mod controller;
    pub mod discovery;
    pub mod resolver;
}

pub use error::Error;
