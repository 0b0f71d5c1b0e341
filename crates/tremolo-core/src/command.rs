//! Slash command parsing.
//!
//! The terminal front-end accepts `/command args` input. Parsing lives here
//! so the mapping from text to player requests can be tested without a
//! terminal.

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::track::{ PlaylistId, TrackId };


/// Errors that can occur during command parsing.
#[derive( Debug, Error, PartialEq )]
pub enum CommandError {
    #[error( "Unknown command: {0}" )]
    Unknown( String ),

    #[error( "Invalid argument: {0}" )]
    InvalidArgument( String ),

    #[error( "Missing argument: {0}" )]
    MissingArgument( String ),
}


/// Where to seek to.
#[derive( Debug, Clone, Copy, PartialEq )]
pub enum SeekTarget {
    /// Fraction of the track, 0.0 to 1.0.
    Fraction( f64 ),
    /// Absolute position.
    Position( Duration ),
}


impl SeekTarget {
    /// Converts to a fraction of a track of the given length.
    ///
    /// Returns None for an absolute position on a track without duration.
    pub fn fraction_of( &self, duration_secs: u32 ) -> Option<f64> {
        match *self {
            SeekTarget::Fraction( f ) => Some( f.clamp( 0.0, 1.0 ) ),
            SeekTarget::Position( _ ) if duration_secs == 0 => None,
            SeekTarget::Position( p ) => {
                Some( ( p.as_secs_f64() / f64::from( duration_secs ) ).clamp( 0.0, 1.0 ) )
            }
        }
    }
}


impl FromStr for SeekTarget {
    type Err = CommandError;


    /// Accepts `50%`, `0.5`, `1:30` or `90` (seconds).
    fn from_str( s: &str ) -> Result<Self, Self::Err> {
        let s = s.trim();

        if let Some( percent ) = s.strip_suffix( '%' ) {
            let value: f64 = percent.trim().parse()
                .map_err( |_| CommandError::InvalidArgument( format!( "Invalid percentage: {}", s ) ) )?;
            return Ok( SeekTarget::Fraction( value / 100.0 ) );
        }

        if s.contains( '.' ) {
            let value: f64 = s.parse()
                .map_err( |_| CommandError::InvalidArgument( format!( "Invalid fraction: {}", s ) ) )?;
            return Ok( SeekTarget::Fraction( value ) );
        }

        parse_time( s ).map( SeekTarget::Position )
    }
}


/// Parsed slash command.
#[derive( Debug, Clone, PartialEq )]
pub enum Command {
    // Loading commands
    Track { id: TrackId },
    Playlist { id: PlaylistId },
    Playlists,
    Top,
    Search { term: String },
    Queue { id: TrackId },

    // Playback commands
    Play,
    Next,
    Prev,
    Seek { target: SeekTarget },
    Shuffle,
    Repeat,
    Volume { level: Option<u32> },

    // Library commands
    Like,
    Unlike { id: Option<TrackId> },

    // UI commands
    Help,
    Quit,
}


impl Command {
    /// Parses a command string (without the leading `/`).
    ///
    /// @param input - The command string to parse
    ///
    /// @returns The parsed command or an error
    pub fn parse( input: &str ) -> Result<Self, CommandError> {
        let input = input.trim();
        let mut parts = input.splitn( 2, ' ' );
        let cmd = parts.next().unwrap_or( "" ).to_lowercase();
        let args = parts.next().map( |s| s.trim() ).filter( |s| !s.is_empty() );

        match cmd.as_str() {
            "track" | "t" => Ok( Command::Track { id: TrackId( parse_id( args, "track id" )? ) } ),
            "playlist" | "pl" => Ok( Command::Playlist { id: PlaylistId( parse_id( args, "playlist id" )? ) } ),
            "playlists" | "pls" => Ok( Command::Playlists ),
            "top" | "chart" | "home" => Ok( Command::Top ),
            "search" | "find" | "?" => {
                let term = args
                    .ok_or_else( || CommandError::MissingArgument( "search term".into() ) )?;
                Ok( Command::Search { term: term.to_string() } )
            }
            "queue" | "enqueue" | "q+" => Ok( Command::Queue { id: TrackId( parse_id( args, "track id" )? ) } ),

            "play" | "pause" | "p" => Ok( Command::Play ),
            "next" | "n" => Ok( Command::Next ),
            "prev" | "previous" | "pr" => Ok( Command::Prev ),
            "seek" | "sk" => {
                let target = args
                    .ok_or_else( || CommandError::MissingArgument( "seek position".into() ) )?
                    .parse::<SeekTarget>()?;
                Ok( Command::Seek { target } )
            }
            "shuffle" | "sh" => Ok( Command::Shuffle ),
            "repeat" | "rep" => Ok( Command::Repeat ),
            "vol" | "volume" => {
                let level = args.and_then( |s| s.parse().ok() );
                Ok( Command::Volume { level } )
            }

            "like" | "heart" => Ok( Command::Like ),
            "unlike" => {
                let id = args.map( |s| parse_id( Some( s ), "track id" ) ).transpose()?;
                Ok( Command::Unlike { id: id.map( TrackId ) } )
            }

            "help" | "h" => Ok( Command::Help ),
            "quit" | "q" | "exit" => Ok( Command::Quit ),

            "" => Err( CommandError::Unknown( "empty command".into() ) ),
            other => Err( CommandError::Unknown( other.to_string() ) ),
        }
    }


    /// Returns a brief description of the command for help text.
    pub fn description( &self ) -> &'static str {
        match self {
            Command::Track { .. } => "Play a track by id",
            Command::Playlist { .. } => "Play a playlist by id",
            Command::Playlists => "Browse chart playlists",
            Command::Top => "Play the current chart",
            Command::Search { .. } => "Search the catalog",
            Command::Queue { .. } => "Add a track to the queue",
            Command::Play => "Toggle play/pause",
            Command::Next => "Next track",
            Command::Prev => "Previous track",
            Command::Seek { .. } => "Seek to position",
            Command::Shuffle => "Shuffle the queue",
            Command::Repeat => "Toggle repeat one",
            Command::Volume { .. } => "Set volume (0-100)",
            Command::Like => "Like the current track",
            Command::Unlike { .. } => "Remove a track from liked songs",
            Command::Help => "Show help",
            Command::Quit => "Quit application",
        }
    }
}


fn parse_id( args: Option<&str>, what: &str ) -> Result<u64, CommandError> {
    let raw = args.ok_or_else( || CommandError::MissingArgument( what.to_string() ) )?;
    raw.parse()
        .map_err( |_| CommandError::InvalidArgument( format!( "Invalid {}: {}", what, raw ) ) )
}


/// Parses a time string like "1:30" or "90" into a Duration.
///
/// @param s - Time string in format "MM:SS", "M:SS", or just seconds
///
/// @returns Duration or error
fn parse_time( s: &str ) -> Result<Duration, CommandError> {
    let s = s.trim();

    if let Some(( min, sec )) = s.split_once( ':' ) {
        let minutes: u64 = min.parse()
            .map_err( |_| CommandError::InvalidArgument( format!( "Invalid minutes: {}", min ) ) )?;
        let seconds: u64 = sec.parse()
            .map_err( |_| CommandError::InvalidArgument( format!( "Invalid seconds: {}", sec ) ) )?;
        Ok( Duration::from_secs( minutes * 60 + seconds ) )
    } else {
        let seconds: u64 = s.parse()
            .map_err( |_| CommandError::InvalidArgument( format!( "Invalid time: {}", s ) ) )?;
        Ok( Duration::from_secs( seconds ) )
    }
}


/// Returns help text listing all available commands.
pub fn help_text() -> &'static str {
    r#"Loading Commands:
  /track <id>       Play a track by id
  /playlist <id>    Play a playlist by id
  /playlists        Browse chart playlists
  /top              Play the current chart
  /search <term>    Search the catalog     [s]
  /queue <id>       Add a track to the queue

Playback Commands:
  /play             Toggle play/pause      [Space]
  /next             Next track             [n]
  /prev             Previous track         [p]
  /seek <pos>       Seek (50%, 0.5, 1:30, 90)
  /shuffle          Shuffle the queue      [z]
  /repeat           Toggle repeat one      [r]

Library Commands:
  /like             Like current track     [l]
  /unlike [id]      Unlike a track

Other Commands:
  /vol [0-100]      Set volume             [+/-]
  /help             Show this help         [?]
  /quit             Exit tremolo           [q]"#
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_parse_track() {
        let cmd = Command::parse( "track 3135556" ).unwrap();
        assert_eq!( cmd, Command::Track { id: TrackId( 3135556 ) } );
    }


    #[test]
    fn test_parse_playlist_alias() {
        let cmd = Command::parse( "pl 908622995" ).unwrap();
        assert_eq!( cmd, Command::Playlist { id: PlaylistId( 908622995 ) } );
    }


    #[test]
    fn test_parse_invalid_id() {
        let result = Command::parse( "track abc" );
        assert!( matches!( result, Err( CommandError::InvalidArgument( _ ) ) ) );
    }


    #[test]
    fn test_parse_seek_variants() {
        assert_eq!(
            Command::parse( "seek 50%" ).unwrap(),
            Command::Seek { target: SeekTarget::Fraction( 0.5 ) }
        );
        assert_eq!(
            Command::parse( "seek 0.25" ).unwrap(),
            Command::Seek { target: SeekTarget::Fraction( 0.25 ) }
        );
        assert_eq!(
            Command::parse( "seek 1:30" ).unwrap(),
            Command::Seek { target: SeekTarget::Position( Duration::from_secs( 90 ) ) }
        );
        assert_eq!(
            Command::parse( "sk 45" ).unwrap(),
            Command::Seek { target: SeekTarget::Position( Duration::from_secs( 45 ) ) }
        );
    }


    #[test]
    fn test_seek_target_fraction_of() {
        assert_eq!( SeekTarget::Position( Duration::from_secs( 15 ) ).fraction_of( 30 ), Some( 0.5 ) );
        assert_eq!( SeekTarget::Position( Duration::from_secs( 90 ) ).fraction_of( 30 ), Some( 1.0 ) );
        assert_eq!( SeekTarget::Position( Duration::from_secs( 5 ) ).fraction_of( 0 ), None );
        assert_eq!( SeekTarget::Fraction( 2.0 ).fraction_of( 0 ), Some( 1.0 ) );
    }


    #[test]
    fn test_parse_unlike_with_and_without_id() {
        assert_eq!( Command::parse( "unlike" ).unwrap(), Command::Unlike { id: None } );
        assert_eq!( Command::parse( "unlike 12" ).unwrap(), Command::Unlike { id: Some( TrackId( 12 ) ) } );
    }


    #[test]
    fn test_parse_search_keeps_spaces() {
        let cmd = Command::parse( "search daft punk" ).unwrap();
        assert_eq!( cmd, Command::Search { term: "daft punk".into() } );
    }


    #[test]
    fn test_description_follows_alias() {
        assert_eq!( Command::parse( "n" ).unwrap().description(), "Next track" );
        assert_eq!( Command::parse( "pause" ).unwrap().description(), "Toggle play/pause" );
        assert_eq!( Command::parse( "playlists" ).unwrap().description(), "Browse chart playlists" );
    }


    #[test]
    fn test_parse_playlists_is_not_playlist() {
        assert_eq!( Command::parse( "pls" ), Ok( Command::Playlists ) );
        assert_eq!( Command::parse( "playlists" ), Ok( Command::Playlists ) );
        assert!( matches!( Command::parse( "pl" ), Err( CommandError::MissingArgument( _ ) ) ) );
    }


    #[test]
    fn test_parse_unknown() {
        let result = Command::parse( "foobar" );
        assert!( matches!( result, Err( CommandError::Unknown( _ ) ) ) );
    }


    #[test]
    fn test_parse_missing_arg() {
        let result = Command::parse( "track" );
        assert!( matches!( result, Err( CommandError::MissingArgument( _ ) ) ) );
        let result = Command::parse( "search   " );
        assert!( matches!( result, Err( CommandError::MissingArgument( _ ) ) ) );
    }
}
