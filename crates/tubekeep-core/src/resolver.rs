//! Playlist name resolution.
//!
//! Maps a user-supplied playlist name to one of the cached playlists, either
//! by exact title or by the closest title under edit distance.

use tracing::debug;

use crate::catalog::PlaylistRecord;
use crate::similarity::{levenshtein, normalize};

/// First playlist whose title equals the trimmed query, case-sensitively.
#[must_use]
pub fn resolve_exact<'a>(
    playlists: &'a [PlaylistRecord],
    name: &str,
) -> Option<&'a PlaylistRecord> {
    let name = name.trim();
    playlists.iter().find(|p| p.title == name)
}

/// Playlist whose normalized title is closest to the normalized query.
///
/// Always returns a playlist unless `playlists` is empty. Ties are broken by
/// the smaller title, then the smaller ID, so the result does not depend on
/// the order the catalog returned playlists in.
#[must_use]
pub fn resolve_fuzzy<'a>(
    playlists: &'a [PlaylistRecord],
    name: &str,
) -> Option<&'a PlaylistRecord> {
    let query = normalize(name);

    let best = playlists
        .iter()
        .map(|p| (levenshtein(&query, &normalize(&p.title)), p))
        .min_by(|(da, a), (db, b)| {
            da.cmp(db)
                .then_with(|| a.title.cmp(&b.title))
                .then_with(|| a.id.cmp(&b.id))
        });

    if let Some((distance, playlist)) = best {
        debug!(
            "Resolved '{}' to playlist '{}' (distance {})",
            name.trim(),
            playlist.title,
            distance
        );
    }
    best.map(|(_, p)| p)
}

/// Resolve exactly or fuzzily depending on `fuzzy`.
#[must_use]
pub fn resolve<'a>(
    playlists: &'a [PlaylistRecord],
    name: &str,
    fuzzy: bool,
) -> Option<&'a PlaylistRecord> {
    if fuzzy {
        resolve_fuzzy(playlists, name)
    } else {
        resolve_exact(playlists, name)
    }
}
