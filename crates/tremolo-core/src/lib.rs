//! Tremolo Core - Playback state for a streaming music player
//!
//! This crate holds the player state machine, its queue and liked-songs
//! collections, the playback engine abstraction with a real audio engine,
//! catalog lookups and the async service that drives everything.

pub mod audio;
pub mod catalog;
pub mod command;
pub mod engine;
pub mod liked;
pub mod observer;
pub mod player;
pub mod queue;
pub mod service;
pub mod track;

#[cfg( test )]
mod testing;

pub use audio::AudioEngine;
pub use catalog::{ Catalog, StaticCatalog };
pub use command::{ Command, CommandError, SeekTarget };
pub use engine::{ engine_channel, EngineError, EngineEvent, PlaybackEngine, Session, SessionId };
pub use liked::LikedSongs;
pub use observer::{ ChannelObserver, PlayerEvent, PlayerSnapshot, PlayerStatus, StateObserver, WatchObserver };
pub use player::{ Lookup, Player, PlayerConfig, PlayerError };
pub use queue::Queue;
pub use service::{ PlayerHandle, PlayerRequest, PlayerService, ServiceError };
pub use track::{ format_time, PlaylistId, PlaylistSummary, Track, TrackId };
