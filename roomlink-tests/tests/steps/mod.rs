mod heartbeat_steps;
mod peer_link_steps;
mod room_steps;
