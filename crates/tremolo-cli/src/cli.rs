//! Command-line argument parsing for Tremolo.

use clap::Parser;


/// Tremolo - A terminal client for streaming music previews.
#[derive( Parser, Debug )]
#[command( name = "tremolo" )]
#[command( version, about, long_about = None )]
pub struct Args {
    /// Track id to play on startup.
    #[arg( short, long, conflicts_with_all = [ "playlist", "top" ] )]
    pub track: Option<u64>,

    /// Playlist id to play on startup.
    #[arg( short, long, conflicts_with = "top" )]
    pub playlist: Option<u64>,

    /// Start playing the current chart.
    #[arg( long )]
    pub top: bool,
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_no_arguments() {
        let args = Args::try_parse_from( [ "tremolo" ] ).unwrap();
        assert_eq!( args.track, None );
        assert_eq!( args.playlist, None );
        assert!( !args.top );
    }


    #[test]
    fn test_track_and_playlist_conflict() {
        assert!( Args::try_parse_from( [ "tremolo", "--track", "1", "--playlist", "2" ] ).is_err() );
        let args = Args::try_parse_from( [ "tremolo", "-p", "908622995" ] ).unwrap();
        assert_eq!( args.playlist, Some( 908622995 ) );
    }
}
