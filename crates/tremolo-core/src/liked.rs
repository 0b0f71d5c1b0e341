//! Liked songs set.

use crate::track::TrackId;


/// Set of liked track ids, kept in the order they were liked.
#[derive( Debug, Clone, Default, PartialEq, Eq )]
pub struct LikedSongs {
    ids: Vec<TrackId>,
}


impl LikedSongs {
    pub fn new() -> Self {
        Self::default()
    }


    /// Adds an id. Returns false if it was already liked.
    pub fn insert( &mut self, id: TrackId ) -> bool {
        if self.contains( id ) {
            return false;
        }
        self.ids.push( id );
        true
    }


    /// Removes an id. Returns false if it was not liked.
    pub fn remove( &mut self, id: TrackId ) -> bool {
        match self.ids.iter().position( |&liked| liked == id ) {
            Some( index ) => {
                self.ids.remove( index );
                true
            }
            None => false,
        }
    }


    pub fn contains( &self, id: TrackId ) -> bool {
        self.ids.contains( &id )
    }


    pub fn ids( &self ) -> &[TrackId] {
        &self.ids
    }


    pub fn len( &self ) -> usize {
        self.ids.len()
    }


    pub fn is_empty( &self ) -> bool {
        self.ids.is_empty()
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_insert_twice_keeps_one() {
        let mut liked = LikedSongs::new();
        assert!( liked.insert( TrackId( 5 ) ) );
        assert!( !liked.insert( TrackId( 5 ) ) );
        assert_eq!( liked.ids(), &[ TrackId( 5 ) ] );
    }


    #[test]
    fn test_remove_is_idempotent() {
        let mut liked = LikedSongs::new();
        liked.insert( TrackId( 1 ) );
        liked.insert( TrackId( 2 ) );
        assert!( liked.remove( TrackId( 1 ) ) );
        assert!( !liked.remove( TrackId( 1 ) ) );
        assert_eq!( liked.ids(), &[ TrackId( 2 ) ] );
    }
}
