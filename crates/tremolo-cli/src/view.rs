//! View mode management for the TUI.


/// Current view mode of the application.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Default )]
pub enum ViewMode {
    /// Play queue with the current track highlighted.
    #[default]
    Queue,

    /// Search results or the chart.
    Search,

    /// Liked songs.
    Liked,

    /// Chart playlists.
    Playlists,

    /// Help overlay - shows available commands.
    Help,
}


impl ViewMode {
    /// Returns the next view in tab order (excluding Help overlay).
    pub fn next_tab( self ) -> Self {
        match self {
            ViewMode::Queue => ViewMode::Search,
            ViewMode::Search => ViewMode::Liked,
            ViewMode::Liked => ViewMode::Playlists,
            ViewMode::Playlists => ViewMode::Queue,
            ViewMode::Help => ViewMode::Help,
        }
    }


    /// Returns the previous view in tab order (excluding Help overlay).
    pub fn prev_tab( self ) -> Self {
        match self {
            ViewMode::Queue => ViewMode::Playlists,
            ViewMode::Search => ViewMode::Queue,
            ViewMode::Liked => ViewMode::Search,
            ViewMode::Playlists => ViewMode::Liked,
            ViewMode::Help => ViewMode::Help,
        }
    }


    pub fn title( &self ) -> &'static str {
        match self {
            ViewMode::Queue => "QUEUE",
            ViewMode::Search => "SEARCH",
            ViewMode::Liked => "LIKED",
            ViewMode::Playlists => "PLAYLISTS",
            ViewMode::Help => "HELP",
        }
    }


    /// Key hints shown in the status bar.
    pub fn hint( &self ) -> &'static str {
        match self {
            ViewMode::Queue => " [/]Cmd [Tab]Views [Space]Play [n/p]Skip [z]Shuffle [r]Repeat [l]Like [?]Help [q]Quit ",
            ViewMode::Search => " [s]Search [Enter]Play [a]Queue [Tab]Views [?]Help ",
            ViewMode::Liked => " [d]Unlike [Tab]Views [?]Help ",
            ViewMode::Playlists => " [Enter]Play playlist [Tab]Views [?]Help ",
            ViewMode::Help => " [?]Close [Esc]Close ",
        }
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_tab_order_cycles() {
        let mut view = ViewMode::Queue;
        for _ in 0..4 {
            view = view.next_tab();
        }
        assert_eq!( view, ViewMode::Queue );
        assert_eq!( ViewMode::Queue.prev_tab(), ViewMode::Playlists );
        assert_eq!( ViewMode::Playlists.next_tab().prev_tab(), ViewMode::Playlists );
    }


    #[test]
    fn test_help_is_sticky() {
        assert_eq!( ViewMode::Help.next_tab(), ViewMode::Help );
        assert_eq!( ViewMode::Help.prev_tab(), ViewMode::Help );
    }
}
