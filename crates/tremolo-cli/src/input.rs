//! Text entry for the status line.
//!
//! The status line doubles as a prompt for slash commands and catalog
//! searches.


/// What the prompt is collecting.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Default )]
pub enum InputMode {
    /// Keyboard shortcuts active.
    #[default]
    Normal,

    /// Typing a slash command.
    Command,

    /// Typing a catalog search term.
    Search,
}


impl InputMode {
    /// Text shown before the typed content.
    pub fn prompt( &self ) -> &'static str {
        match self {
            InputMode::Normal => "",
            InputMode::Command => "/",
            InputMode::Search => "Search: ",
        }
    }
}


/// Single-line edit buffer. The cursor counts characters, not bytes.
#[derive( Debug, Default )]
pub struct InputBuffer {
    content: String,
    cursor: usize,
}


impl InputBuffer {
    pub fn new() -> Self {
        Self::default()
    }


    fn byte_offset( &self, chars: usize ) -> usize {
        self.content
            .char_indices()
            .nth( chars )
            .map( |( i, _ )| i )
            .unwrap_or( self.content.len() )
    }


    fn char_len( &self ) -> usize {
        self.content.chars().count()
    }


    pub fn insert( &mut self, c: char ) {
        let at = self.byte_offset( self.cursor );
        self.content.insert( at, c );
        self.cursor += 1;
    }


    /// Deletes the character before the cursor.
    pub fn backspace( &mut self ) {
        if self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        let at = self.byte_offset( self.cursor );
        self.content.remove( at );
    }


    /// Deletes the character under the cursor.
    pub fn delete( &mut self ) {
        if self.cursor < self.char_len() {
            let at = self.byte_offset( self.cursor );
            self.content.remove( at );
        }
    }


    pub fn move_left( &mut self ) {
        self.cursor = self.cursor.saturating_sub( 1 );
    }


    pub fn move_right( &mut self ) {
        self.cursor = ( self.cursor + 1 ).min( self.char_len() );
    }


    pub fn move_home( &mut self ) {
        self.cursor = 0;
    }


    pub fn move_end( &mut self ) {
        self.cursor = self.char_len();
    }


    pub fn clear( &mut self ) {
        self.content.clear();
        self.cursor = 0;
    }


    /// Returns the content and leaves the buffer empty.
    pub fn take( &mut self ) -> String {
        self.cursor = 0;
        std::mem::take( &mut self.content )
    }


    pub fn content( &self ) -> &str {
        &self.content
    }


    /// Cursor column for display.
    pub fn cursor( &self ) -> usize {
        self.cursor
    }


    pub fn is_empty( &self ) -> bool {
        self.content.is_empty()
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    fn typed( text: &str ) -> InputBuffer {
        let mut buffer = InputBuffer::new();
        text.chars().for_each( |c| buffer.insert( c ) );
        buffer
    }


    #[test]
    fn test_insert_in_the_middle() {
        let mut buffer = typed( "sek 50%" );
        buffer.move_home();
        buffer.move_right();
        buffer.move_right();
        buffer.insert( 'e' );
        assert_eq!( buffer.content(), "seek 50%" );
        assert_eq!( buffer.cursor(), 3 );
    }


    #[test]
    fn test_multibyte_editing() {
        let mut buffer = typed( "Beyoncé" );
        buffer.backspace();
        assert_eq!( buffer.content(), "Beyonc" );

        buffer.insert( 'é' );
        buffer.move_left();
        buffer.delete();
        assert_eq!( buffer.content(), "Beyonc" );
        assert_eq!( buffer.cursor(), 6 );
    }


    #[test]
    fn test_cursor_stays_in_bounds() {
        let mut buffer = typed( "ab" );
        buffer.move_right();
        assert_eq!( buffer.cursor(), 2 );
        buffer.move_home();
        buffer.move_left();
        buffer.backspace();
        assert_eq!( buffer.cursor(), 0 );
        assert_eq!( buffer.content(), "ab" );
    }


    #[test]
    fn test_take_empties_buffer() {
        let mut buffer = typed( "top" );
        assert_eq!( buffer.take(), "top" );
        assert!( buffer.is_empty() );
        assert_eq!( buffer.cursor(), 0 );
    }
}
