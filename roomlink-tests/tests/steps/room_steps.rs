use cucumber::{given, then, when};
use roomlink_client::{CreateRoomRequest, JoinFailure, LocalRequest};
use roomlink_core::RoomId;
use roomlink_tests::RoomWorld;

// ===== Given Steps =====

#[given(expr = "{string} is connected to the relay")]
async fn connected(world: &mut RoomWorld, name: String) {
    world.connect(&name);
}

#[given(expr = "{string} created room {string} for {int} members")]
async fn created_room(world: &mut RoomWorld, name: String, room: String, max_members: usize) {
    create_room(
        world,
        &name,
        &room,
        CreateRoomRequest::new(room.clone()).with_max_members(max_members),
    );
}

#[given(expr = "{string} created room {string} for {int} members with password {string}")]
async fn created_room_with_password(
    world: &mut RoomWorld,
    name: String,
    room: String,
    max_members: usize,
    password: String,
) {
    create_room(
        world,
        &name,
        &room,
        CreateRoomRequest::new(room.clone())
            .with_max_members(max_members)
            .with_password(password),
    );
}

fn create_room(world: &mut RoomWorld, name: &str, room: &str, request: CreateRoomRequest) {
    world.connect(name);
    world.request(name, LocalRequest::CreateRoom(request));

    let room_id = world
        .participant(name)
        .manager
        .room()
        .map(|snapshot| snapshot.room_id.clone())
        .unwrap_or_else(|| panic!("{} did not end up in room '{}'", name, room));
    world.room_ids.insert(room.to_string(), room_id);
}

#[given(expr = "{string} joined room {string}")]
async fn joined_room(world: &mut RoomWorld, name: String, room: String) {
    world.connect(&name);
    let room_id = world.room_id(&room);
    join(world, &name, room_id, None);
    assert!(
        world.participant(&name).manager.room().is_some(),
        "{} could not join '{}'",
        name,
        room
    );
}

#[given(expr = "{string} has listed the rooms")]
async fn listed_rooms(world: &mut RoomWorld, name: String) {
    world.request(&name, LocalRequest::RefreshRooms);
}

// ===== When Steps =====

#[when(expr = "{string} joins room {string}")]
async fn joins_room(world: &mut RoomWorld, name: String, room: String) {
    let room_id = world.room_id(&room);
    join(world, &name, room_id, None);
}

#[when(expr = "{string} joins room {string} with password {string}")]
async fn joins_room_with_password(
    world: &mut RoomWorld,
    name: String,
    room: String,
    password: String,
) {
    let room_id = world.room_id(&room);
    join(world, &name, room_id, Some(password));
}

#[when(expr = "{string} joins the unknown room {string}")]
async fn joins_unknown_room(world: &mut RoomWorld, name: String, room_id: String) {
    join(world, &name, RoomId::from(room_id), None);
}

#[when(expr = "{string} leaves the room")]
async fn leaves_room(world: &mut RoomWorld, name: String) {
    world.request(&name, LocalRequest::LeaveRoom);
}

fn join(world: &mut RoomWorld, name: &str, room_id: RoomId, password: Option<String>) {
    world.request(name, LocalRequest::JoinRoom { room_id, password });
}

// ===== Then Steps =====

#[then(expr = "{string} is in room {string}")]
async fn is_in_room(world: &mut RoomWorld, name: String, room: String) {
    let expected = world.room_id(&room);
    let actual = world
        .participant(&name)
        .manager
        .room()
        .map(|snapshot| snapshot.room_id.clone());
    assert_eq!(actual, Some(expected), "{} is not in '{}'", name, room);
}

#[then(expr = "{string} is in no room")]
async fn is_in_no_room(world: &mut RoomWorld, name: String) {
    assert!(world.participant(&name).manager.room().is_none());
}

#[then(expr = "{string} was rejected with {string}")]
async fn was_rejected(world: &mut RoomWorld, name: String, reason: String) {
    match world.participant(&name).last_join_failure() {
        Some(JoinFailure::Rejected(actual)) => assert_eq!(actual.to_string(), reason),
        other => panic!("expected rejection '{}', got {:?}", reason, other),
    }
}

#[then(expr = "room {string} has {int} members")]
async fn room_has_members(world: &mut RoomWorld, room: String, count: usize) {
    let summary = world
        .relay
        .room_summary(&world.room_id(&room))
        .expect("room lookup")
        .unwrap_or_else(|| panic!("room '{}' is gone", room));
    assert_eq!(summary.member_count, count);
}

#[then(expr = "room {string} is {string}")]
async fn room_status(world: &mut RoomWorld, room: String, status: String) {
    let summary = world
        .relay
        .room_summary(&world.room_id(&room))
        .expect("room lookup")
        .unwrap_or_else(|| panic!("room '{}' is gone", room));
    assert_eq!(summary.status.to_string(), status);
}

#[then(expr = "the relay has {int} rooms")]
async fn relay_room_count(world: &mut RoomWorld, count: usize) {
    assert_eq!(world.relay.room_count(), count);
}

#[then(expr = "{string} sees {string} in the room")]
async fn sees_member(world: &mut RoomWorld, viewer: String, name: String) {
    let expected = world.session_id(&name);
    let room = world
        .participant(&viewer)
        .manager
        .room()
        .unwrap_or_else(|| panic!("{} is in no room", viewer));
    assert!(
        room.members.iter().any(|m| m.session_id == expected),
        "{} does not see {}",
        viewer,
        name
    );
}

#[then(expr = "{string} no longer sees {string} in the room")]
async fn no_longer_sees_member(world: &mut RoomWorld, viewer: String, name: String) {
    // The departed participant may have no session any more
    let departed = world.participants[&name].connection;
    let room = world
        .participant(&viewer)
        .manager
        .room()
        .unwrap_or_else(|| panic!("{} is in no room", viewer));
    assert!(room.members.iter().all(|m| m.session_id != departed));
}

#[then(expr = "{string} is the host of room {string}")]
async fn is_host_of_room(world: &mut RoomWorld, name: String, room: String) {
    let summary = world
        .relay
        .room_summary(&world.room_id(&room))
        .expect("room lookup")
        .unwrap_or_else(|| panic!("room '{}' is gone", room));
    assert_eq!(summary.host_id, world.session_id(&name));
}

#[then(expr = "{string} sees {string} as host")]
async fn sees_host(world: &mut RoomWorld, viewer: String, name: String) {
    let expected = world.session_id(&name);
    let participant = world.participant(&viewer);
    let room = participant
        .manager
        .room()
        .unwrap_or_else(|| panic!("{} is in no room", viewer));
    assert_eq!(room.host_id, expected);
    assert_eq!(
        room.members.iter().filter(|m| m.is_host).count(),
        1,
        "exactly one member flagged as host"
    );
    assert_eq!(participant.manager.is_host(), viewer == name);
}

#[then(expr = "{string} sees room {string} listed")]
async fn sees_room_listed(world: &mut RoomWorld, name: String, room: String) {
    let room_id = world.room_id(&room);
    assert!(world
        .participant(&name)
        .manager
        .rooms()
        .iter()
        .any(|summary| summary.room_id == room_id));
}

#[then(expr = "{string} sees no rooms listed")]
async fn sees_no_rooms(world: &mut RoomWorld, name: String) {
    assert!(world.participant(&name).manager.rooms().is_empty());
}
