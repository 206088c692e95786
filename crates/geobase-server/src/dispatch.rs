//! Request handling for one `/events` message.

use std::sync::Arc;

use geobase_protocol::{command, parse, stringify, stringify_command, ProtocolError, Request};
use geobase_store::{ChangeSet, GeoStore, Subscriber};
use serde::Serialize;

#[derive(Serialize)]
struct UpsertAck<'a> {
    created: bool,
    moved: bool,
    changes: &'a ChangeSet,
}

#[derive(Serialize)]
struct DeleteAck {
    deleted: bool,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    message: &'a str,
}

/// Handles one text message from `subscriber`'s connection.
///
/// Returns the reply frame, if the command has one. Notifications caused by
/// the request (including `LISTEN` backfill) are pushed to `subscriber`
/// before this returns, so they reach the client ahead of the reply.
/// Failures are answered with `ERROR {"message": ...}`.
pub fn handle(store: &GeoStore, subscriber: &Arc<dyn Subscriber>, text: &str) -> Option<String> {
    let request = match parse(text).and_then(|frame| Request::from_frame(&frame)) {
        Ok(request) => request,
        Err(e) => return Some(error_frame(&e)),
    };

    tracing::debug!(subscriber = %subscriber.id(), command = request.command(), "handling request");

    let reply = match request {
        Request::Ping => Ok(stringify_command(command::PONG)),
        Request::Pong => return None,
        Request::Get { object_type, id } => {
            stringify(command::OBJECT, Some(&store.get_one(&object_type, id)))
        }
        Request::Query {
            object_type,
            bounds,
        } => stringify(command::OBJECTS, Some(&store.get_all(&object_type, bounds))),
        Request::Update(patch) => match store.upsert(patch) {
            Ok(outcome) => stringify(
                command::OK,
                Some(&UpsertAck {
                    created: outcome.created,
                    moved: outcome.moved,
                    changes: &outcome.changes,
                }),
            ),
            Err(e) => Err(e.into()),
        },
        Request::Delete { object_type, id } => {
            let outcome = store.delete(&object_type, id);
            stringify(
                command::OK,
                Some(&DeleteAck {
                    deleted: outcome.deleted.is_some(),
                }),
            )
        }
        Request::Listen {
            object_type,
            region,
        } => store
            .subscribe(Arc::clone(subscriber), &object_type, region)
            .map(|()| stringify_command(command::OK))
            .map_err(ProtocolError::from),
        Request::Unlisten { object_type } => {
            store.unsubscribe(subscriber.id(), &object_type);
            Ok(stringify_command(command::OK))
        }
        Request::Profile { object_type } => stringify(
            command::PROFILE,
            Some(&store.get_profile(subscriber.id(), &object_type)),
        ),
        Request::Types => stringify(command::TYPES, Some(&store.list_known_types())),
    };

    Some(reply.unwrap_or_else(|e| error_frame(&e)))
}

/// Renders `ERROR {"message": ...}` for a failed request.
pub fn error_frame(error: &ProtocolError) -> String {
    let message = error.to_string();
    stringify(command::ERROR, Some(&ErrorBody { message: &message }))
        .unwrap_or_else(|_| stringify_command(command::ERROR))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geobase_store::{Notification, RecordingSubscriber};
    use serde_json::{json, Value};

    fn connection() -> (Arc<RecordingSubscriber>, Arc<dyn Subscriber>) {
        let recorder = Arc::new(RecordingSubscriber::new());
        let subscriber: Arc<dyn Subscriber> = recorder.clone();
        (recorder, subscriber)
    }

    fn body(frame: &str) -> Value {
        let (_, json) = frame.split_once(' ').expect("frame should carry a body");
        serde_json::from_str(json).expect("body should be strict json")
    }

    #[test]
    fn ping_is_answered_and_pong_is_silent() {
        let store = GeoStore::new();
        let (_, subscriber) = connection();

        assert_eq!(handle(&store, &subscriber, "PING 4").as_deref(), Some("PONG"));
        assert_eq!(handle(&store, &subscriber, "PONG"), None);
    }

    #[test]
    fn update_reports_creation_then_changes() {
        let store = GeoStore::new();
        let (_, subscriber) = connection();

        let reply = handle(
            &store,
            &subscriber,
            "UPDATE {type: 'bus', id: 7, lat: 60.5, long: 24.5, v: 1, line: '55'}",
        )
        .unwrap();
        assert!(reply.starts_with("OK "));
        assert_eq!(
            body(&reply),
            json!({
                "created": true,
                "moved": false,
                "changes": { "lat": 60.5, "long": 24.5, "v": 1, "line": "55" }
            })
        );

        let reply = handle(&store, &subscriber, "update {type: 'bus', id: 7, lat: 61}").unwrap();
        assert_eq!(
            body(&reply),
            json!({ "created": false, "moved": true, "changes": { "lat": 61 } })
        );
    }

    #[test]
    fn listen_backfills_before_acknowledging() {
        let store = GeoStore::new();
        let (_, writer) = connection();
        handle(&store, &writer, "UPDATE {type: 'bus', id: 1, lat: 5, long: 5, v: 1}");

        let (recorder, subscriber) = connection();
        let reply = handle(
            &store,
            &subscriber,
            "LISTEN {type: 'bus', minLat: 0, maxLat: 10, minLong: 0, maxLong: 10}",
        );

        assert_eq!(reply.as_deref(), Some("OK"));
        let received = recorder.take();
        assert_eq!(received.len(), 1);
        assert!(matches!(&received[0], Notification::Updated(update) if update.is_full()));

        let profile = handle(&store, &subscriber, "PROFILE {type: 'bus'}").unwrap();
        assert_eq!(
            body(&profile),
            json!({ "minLat": 0, "maxLat": 10, "minLong": 0, "maxLong": 10 })
        );
        assert_eq!(
            handle(&store, &subscriber, "TYPES").as_deref(),
            Some(r#"TYPES ["bus"]"#)
        );
    }

    #[test]
    fn unlisten_clears_profile() {
        let store = GeoStore::new();
        let (_, subscriber) = connection();

        handle(
            &store,
            &subscriber,
            "LISTEN {type: 'bus', minLat: 0, maxLat: 1, minLong: 0, maxLong: 1}",
        );
        assert_eq!(
            handle(&store, &subscriber, "UNLISTEN {type: 'bus'}").as_deref(),
            Some("OK")
        );
        assert_eq!(
            handle(&store, &subscriber, "PROFILE {type: 'bus'}").as_deref(),
            Some("PROFILE")
        );
    }

    #[test]
    fn get_and_delete() {
        let store = GeoStore::new();
        let (_, subscriber) = connection();
        handle(&store, &subscriber, "UPDATE {type: 'bus', id: 1, lat: 5, long: 5, v: 2}");
        handle(&store, &subscriber, "UPDATE {type: 'bus', id: 2, lat: 50, long: 50, v: 2}");

        let one = handle(&store, &subscriber, "GET {type: 'bus', id: 1}").unwrap();
        assert_eq!(
            body(&one),
            json!({ "type": "bus", "id": 1, "lat": 5, "long": 5, "v": 2 })
        );

        let some = handle(
            &store,
            &subscriber,
            "GET {type: 'bus', minLat: 0, maxLat: 10, minLong: 0, maxLong: 10}",
        )
        .unwrap();
        assert_eq!(body(&some).as_array().map(Vec::len), Some(1));

        let all = handle(&store, &subscriber, "GET {type: 'bus'}").unwrap();
        assert_eq!(body(&all).as_array().map(Vec::len), Some(2));

        let deleted = handle(&store, &subscriber, "DELETE {type: 'bus', id: 1}").unwrap();
        assert_eq!(body(&deleted), json!({ "deleted": true }));
        let deleted = handle(&store, &subscriber, "DELETE {type: 'bus', id: 1}").unwrap();
        assert_eq!(body(&deleted), json!({ "deleted": false }));

        assert_eq!(
            handle(&store, &subscriber, "GET {type: 'bus', id: 1}").as_deref(),
            Some("OBJECT")
        );
    }

    #[test]
    fn failures_become_error_frames() {
        let store = GeoStore::new();
        let (_, subscriber) = connection();

        let reply = handle(&store, &subscriber, "FROB").unwrap();
        assert_eq!(reply, r#"ERROR {"message":"unknown command: FROB"}"#);

        let reply = handle(&store, &subscriber, "LISTEN {type: 'bus', minLat: 5.55}").unwrap();
        assert_eq!(
            body(&reply),
            json!({ "message": "maxLat is not of type number: undefined" })
        );

        let reply = handle(&store, &subscriber, "UPDATE {type: 'bus', id: 1}").unwrap();
        assert_eq!(
            body(&reply),
            json!({ "message": "lat is not of type number: undefined" })
        );
        assert!(store.get_one("bus", 1).is_none());
    }
}
