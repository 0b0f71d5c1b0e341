//! Application settings management
//!
//! Persistent settings: where the catalog lives and how the player starts.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{ Deserialize, Serialize };
use tremolo_core::PlayerConfig;


/// Application settings.
#[derive( Debug, Clone, PartialEq, Serialize, Deserialize )]
#[serde( default )]
pub struct Settings {
    /// Base URL of the catalog API
    pub api_base: String,

    /// Timeout for catalog requests and audio downloads
    pub http_timeout_secs: u64,

    /// Volume restored on startup (0.0 to 1.0)
    pub volume: f32,

    /// Progress refresh interval while playing
    pub tick_interval_ms: u64,
}


impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base: "https://api.deezer.com".to_string(),
            http_timeout_secs: 15,
            volume: 1.0,
            tick_interval_ms: 1000,
        }
    }
}


impl Settings {
    /// Returns the path to the settings file.
    fn settings_path() -> Option<PathBuf> {
        dirs::config_dir().map( |p| p.join( "tremolo" ).join( "settings.json" ) )
    }


    /// Loads settings from disk, or returns defaults if not found.
    pub fn load() -> Self {
        let path = match Self::settings_path() {
            Some( p ) => p,
            None => return Self::default(),
        };

        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string( &path ) {
            Ok( contents ) => Self::parse( &contents ),
            Err( e ) => {
                tracing::warn!( "Failed to read settings: {}", e );
                Self::default()
            }
        }
    }


    /// Parses settings JSON. Missing fields take their defaults, a broken
    /// file gives the defaults.
    fn parse( contents: &str ) -> Self {
        match serde_json::from_str( contents ) {
            Ok( settings ) => settings,
            Err( e ) => {
                tracing::warn!( "Ignoring invalid settings: {}", e );
                Self::default()
            }
        }
    }


    /// Saves settings to disk.
    pub fn save( &self ) {
        let path = match Self::settings_path() {
            Some( p ) => p,
            None => return,
        };

        if let Some( parent ) = path.parent() {
            if !parent.exists() {
                if let Err( e ) = fs::create_dir_all( parent ) {
                    tracing::warn!( "Failed to create settings directory: {}", e );
                    return;
                }
            }
        }

        match serde_json::to_string_pretty( self ) {
            Ok( json ) => {
                if let Err( e ) = fs::write( &path, json ) {
                    tracing::warn!( "Failed to save settings: {}", e );
                }
            }
            Err( e ) => {
                tracing::warn!( "Failed to serialize settings: {}", e );
            }
        }
    }


    pub fn http_timeout( &self ) -> Duration {
        Duration::from_secs( self.http_timeout_secs.max( 1 ) )
    }


    /// Player configuration derived from these settings.
    pub fn player_config( &self ) -> PlayerConfig {
        PlayerConfig {
            initial_volume: self.volume.clamp( 0.0, 1.0 ),
            tick_interval: Duration::from_millis( self.tick_interval_ms ),
        }
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_partial_file_keeps_defaults() {
        let settings = Settings::parse( r#"{ "volume": 0.4 }"# );
        assert_eq!( settings.volume, 0.4 );
        assert_eq!( settings.api_base, "https://api.deezer.com" );
        assert_eq!( settings.tick_interval_ms, 1000 );
    }


    #[test]
    fn test_invalid_file_gives_defaults() {
        assert_eq!( Settings::parse( "{ not json" ), Settings::default() );
    }


    #[test]
    fn test_player_config_clamps_volume() {
        let settings = Settings { volume: 3.0, tick_interval_ms: 250, ..Settings::default() };
        let config = settings.player_config();
        assert_eq!( config.initial_volume, 1.0 );
        assert_eq!( config.tick_interval, Duration::from_millis( 250 ) );
    }


    #[test]
    fn test_round_trips_through_json() {
        let settings = Settings { api_base: "http://localhost:8080".into(), ..Settings::default() };
        let json = serde_json::to_string( &settings ).unwrap();
        assert_eq!( Settings::parse( &json ), settings );
    }
}
