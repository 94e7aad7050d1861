use std::time::Duration;

use mockito::{Matcher, Mock, Server, ServerGuard};
use pmospotify::{SpotifyBackend, SpotifyClient, SpotifyError, TokenManager};
use pmoturntable::{BackendError, MediaRef, PlaybackBackend, PlaybackSnapshot};
use serde_json::{Value, json};

fn client(server: &ServerGuard) -> SpotifyClient {
    let auth = TokenManager::new("id", "secret", "refresh-me").with_accounts_url(&server.url());
    SpotifyClient::new(auth, Duration::from_secs(5)).with_api_url(&server.url())
}

fn backend(server: &ServerGuard) -> SpotifyBackend {
    SpotifyBackend::new(client(server), None)
}

fn mock_token(server: &mut ServerGuard) -> Mock {
    server
        .mock("POST", "/api/token")
        .match_header("authorization", "Basic aWQ6c2VjcmV0")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
            Matcher::UrlEncoded("refresh_token".into(), "refresh-me".into()),
        ]))
        .with_status(200)
        .with_body(json!({"access_token": "tok-1", "token_type": "Bearer", "expires_in": 3600}).to_string())
}

fn tracks(ids: &[&str], artist: &str) -> Value {
    json!(ids
        .iter()
        .map(|id| json!({
            "id": id,
            "uri": format!("spotify:track:{}", id),
            "name": format!("Track {}", id),
            "artists": [{"name": artist}],
        }))
        .collect::<Vec<_>>())
}

fn uris(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|id| format!("spotify:track:{}", id)).collect()
}

fn mock_play(server: &mut ServerGuard, ids: &[&str], position: usize, position_ms: u64) -> Mock {
    server
        .mock("PUT", "/me/player/play")
        .match_header("authorization", "Bearer tok-1")
        .match_body(Matcher::PartialJson(json!({
            "uris": uris(ids),
            "offset": {"position": position},
            "position_ms": position_ms,
        })))
        .with_status(204)
}

fn mock_live(server: &mut ServerGuard, is_playing: bool, track: &str, progress_ms: u64, context: &str) -> Mock {
    server
        .mock("GET", "/me/player")
        .with_status(200)
        .with_body(
            json!({
                "is_playing": is_playing,
                "progress_ms": progress_ms,
                "item": {"id": track, "uri": format!("spotify:track:{}", track), "name": "x", "artists": []},
                "context": {"uri": context},
            })
            .to_string(),
        )
}

#[test]
fn test_album_cold_start_submits_track_queue() {
    let mut server = Server::new();
    let token = mock_token(&mut server).expect(1).create();
    let _album = server
        .mock("GET", "/albums/100/tracks")
        .match_query(Matcher::UrlEncoded("limit".into(), "50".into()))
        .with_body(json!({"items": tracks(&["a1", "a2", "a3"], "X"), "next": null}).to_string())
        .create();
    let play = mock_play(&mut server, &["a1", "a2", "a3"], 0, 0).expect(1).create();

    let mut backend = backend(&server);
    backend.play(&MediaRef::album("spotify", "100")).unwrap();

    play.assert();
    token.assert();
}

#[test]
fn test_album_pages_are_followed() {
    let mut server = Server::new();
    let _token = mock_token(&mut server).create();
    let next = format!("{}/albums/100/tracks?offset=2&limit=2", server.url());
    let _first = server
        .mock("GET", "/albums/100/tracks")
        .match_query(Matcher::UrlEncoded("limit".into(), "50".into()))
        .with_body(json!({"items": tracks(&["a1", "a2"], "X"), "next": next}).to_string())
        .create();
    let _second = server
        .mock("GET", "/albums/100/tracks")
        .match_query(Matcher::UrlEncoded("offset".into(), "2".into()))
        .with_body(json!({"items": tracks(&["a3"], "X"), "next": null}).to_string())
        .create();
    let play = mock_play(&mut server, &["a1", "a2", "a3"], 0, 0).expect(1).create();

    backend(&server).play(&MediaRef::album("spotify", "100")).unwrap();
    play.assert();
}

#[test]
fn test_playlist_resumes_at_captured_position() {
    let mut server = Server::new();
    let _token = mock_token(&mut server).create();
    let _playlist = server
        .mock("GET", "/playlists/42/tracks")
        .match_query(Matcher::Any)
        .with_body(
            json!({
                "items": [
                    {"track": tracks(&["5"], "X")[0]},
                    {"track": null},
                    {"track": tracks(&["6"], "X")[0]},
                    {"track": tracks(&["7"], "X")[0]},
                ],
                "next": null
            })
            .to_string(),
        )
        .expect(2)
        .create();
    let cold = mock_play(&mut server, &["5", "6", "7"], 0, 0).expect(1).create();
    let resumed = mock_play(&mut server, &["5", "6", "7"], 2, 53_000).expect(1).create();
    let _live = mock_live(&mut server, true, "7", 53_000, "spotify:playlist:42").create();
    let pause = server.mock("PUT", "/me/player/pause").with_status(204).expect(1).create();

    let mut backend = backend(&server);
    let playlist = MediaRef::playlist("spotify", "42");
    backend.play(&playlist).unwrap();
    backend.pause().unwrap();

    assert_eq!(
        *backend.snapshot(),
        PlaybackSnapshot {
            context: Some(playlist.clone()),
            track: Some("7".into()),
            position_ms: 53_000,
        }
    );

    backend.play(&playlist).unwrap();
    cold.assert();
    resumed.assert();
    pause.assert();
}

#[test]
fn test_pause_uses_spotify_context_for_foreign_tracks() {
    let mut server = Server::new();
    let _token = mock_token(&mut server).create();
    let _live = mock_live(&mut server, true, "zz", 1_000, "spotify:album:9").create();
    let _pause = server.mock("PUT", "/me/player/pause").with_status(204).create();

    let mut backend = backend(&server);
    backend.pause().unwrap();
    assert_eq!(backend.snapshot().context, Some(MediaRef::album("spotify", "9")));
    assert_eq!(backend.snapshot().track.as_deref(), Some("zz"));
}

#[test]
fn test_pause_when_already_paused_only_captures() {
    let mut server = Server::new();
    let _token = mock_token(&mut server).create();
    let _live = mock_live(&mut server, false, "t1", 12_000, "spotify:album:1").create();
    let pause = server.mock("PUT", "/me/player/pause").expect(0).create();

    let mut backend = backend(&server);
    backend.pause().unwrap();
    assert_eq!(backend.snapshot().position_ms, 12_000);
    pause.assert();
}

#[test]
fn test_pause_keeps_stale_snapshot_when_state_query_fails() {
    let mut server = Server::new();
    let _token = mock_token(&mut server).create();
    let _live = server.mock("GET", "/me/player").with_status(502).create();
    let pause = server.mock("PUT", "/me/player/pause").with_status(204).expect(1).create();

    let mut backend = backend(&server);
    backend.pause().unwrap();
    assert!(backend.snapshot().is_empty());
    pause.assert();
}

#[test]
fn test_resume_continues_same_track_without_resubmitting() {
    let mut server = Server::new();
    let _token = mock_token(&mut server).create();
    let playing = mock_live(&mut server, true, "t1", 5_000, "spotify:album:1").create();
    let _pause = server.mock("PUT", "/me/player/pause").with_status(204).create();

    let mut backend = backend(&server);
    backend.pause().unwrap();
    drop(playing);

    let _paused = mock_live(&mut server, false, "t1", 5_000, "spotify:album:1").create();
    let resume = server
        .mock("PUT", "/me/player/play")
        .match_body(Matcher::Exact(String::new()))
        .with_status(204)
        .expect(1)
        .create();

    backend.resume().unwrap();
    resume.assert();
}

#[test]
fn test_resume_without_snapshot_is_noop() {
    // Aucune route : toute requête échouerait
    let server = Server::new();
    let mut backend = backend(&server);
    assert_eq!(backend.resume(), Ok(()));
}

#[test]
fn test_artist_tracks_filtered_on_primary_artist_and_never_resumed() {
    let mut server = Server::new();
    let _token = mock_token(&mut server).create();
    let _artist = server
        .mock("GET", "/artists/ar1")
        .with_body(json!({"id": "ar1", "name": "Nina Simone"}).to_string())
        .expect(2)
        .create();
    let mut found = tracks(&["s1", "s2"], "Nina Simone");
    found.as_array_mut().unwrap().insert(
        1,
        json!({"id": "feat", "uri": "spotify:track:feat", "artists": [{"name": "Other"}, {"name": "Nina Simone"}]}),
    );
    let _search = server
        .mock("GET", "/search")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("q".into(), "artist:\"Nina Simone\"".into()),
            Matcher::UrlEncoded("type".into(), "track".into()),
        ]))
        .with_body(json!({"tracks": {"items": found, "next": null}}).to_string())
        .expect(2)
        .create();
    let from_start = mock_play(&mut server, &["s1", "s2"], 0, 0).expect(2).create();
    let resumed = mock_play(&mut server, &["s1", "s2"], 1, 30_000).expect(0).create();
    let _live = mock_live(&mut server, true, "s2", 30_000, "spotify:artist:ar1").create();
    let _pause = server.mock("PUT", "/me/player/pause").with_status(204).create();

    let mut backend = backend(&server);
    let artist = MediaRef::artist("spotify", "ar1");
    backend.play(&artist).unwrap();
    backend.pause().unwrap();
    assert_eq!(
        *backend.snapshot(),
        PlaybackSnapshot {
            context: Some(artist.clone()),
            track: Some("s2".into()),
            position_ms: 30_000,
        }
    );

    backend.play(&artist).unwrap();
    from_start.assert();
    resumed.assert();
}

#[test]
fn test_named_device_is_resolved_once() {
    let mut server = Server::new();
    let _token = mock_token(&mut server).create();
    let devices = server
        .mock("GET", "/me/player/devices")
        .with_body(
            json!({"devices": [
                {"id": "dev-0", "name": "Phone", "is_active": true, "type": "Smartphone"},
                {"id": "dev-1", "name": "Turntable", "is_active": false, "type": "Speaker"},
            ]})
            .to_string(),
        )
        .expect(1)
        .create();
    let play = server
        .mock("PUT", "/me/player/play")
        .match_query(Matcher::UrlEncoded("device_id".into(), "dev-1".into()))
        .with_status(204)
        .expect(2)
        .create();

    let mut backend = SpotifyBackend::new(client(&server), Some("turntable".into()));
    backend.play(&MediaRef::track("spotify", "t1")).unwrap();
    backend.play(&MediaRef::track("spotify", "t2")).unwrap();

    devices.assert();
    play.assert();
}

#[test]
fn test_rejected_token_is_refreshed_once() {
    let mut server = Server::new();
    let token = mock_token(&mut server).expect(2).create();
    let live = server.mock("GET", "/me/player").with_status(401).expect(2).create();

    let mut client = client(&server);
    assert!(matches!(
        client.current_playback(),
        Err(SpotifyError::Unauthorized(_))
    ));
    token.assert();
    live.assert();
}

#[test]
fn test_revoked_refresh_token() {
    let mut server = Server::new();
    let _token = server
        .mock("POST", "/api/token")
        .with_status(400)
        .with_body(json!({"error": "invalid_grant"}).to_string())
        .create();

    let mut client = client(&server);
    assert!(matches!(client.authenticate(), Err(SpotifyError::Unauthorized(_))));
}

#[test]
fn test_nothing_active() {
    let mut server = Server::new();
    let _token = mock_token(&mut server).create();
    let _live = server.mock("GET", "/me/player").with_status(204).create();

    let mut client = client(&server);
    assert_eq!(client.current_playback().unwrap(), None);
}

#[test]
fn test_no_active_device_error() {
    let mut server = Server::new();
    let _token = mock_token(&mut server).create();
    let _play = server
        .mock("PUT", "/me/player/play")
        .with_status(404)
        .with_body(json!({"error": {"status": 404, "message": "Player command failed: No active device found"}}).to_string())
        .create();

    let mut backend = backend(&server);
    assert_eq!(
        backend.play(&MediaRef::track("spotify", "t1")),
        Err(BackendError::NotFound(
            "Player command failed: No active device found".into()
        ))
    );
}

#[test]
fn test_rejects_other_providers() {
    let server = Server::new();
    let mut backend = backend(&server);
    assert!(matches!(
        backend.play(&MediaRef::album("subsonic", "1")),
        Err(BackendError::UnsupportedMedia(_))
    ));
}
