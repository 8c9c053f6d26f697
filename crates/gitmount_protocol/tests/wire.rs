//! Wire-level tests over a real socket pair.

use gitmount_protocol::{
    message, ControlRequest, ControlResponse, FrameFormat, FramedChannel, LineCodec,
};
use std::io::Write;
use std::os::unix::net::UnixStream;
use std::thread;

#[test]
fn request_response_over_socket_pair() {
    let (client, server) = UnixStream::pair().unwrap();

    let handle = thread::spawn(move || {
        let mut channel = FramedChannel::new(server);
        let request = channel.recv().unwrap().unwrap();
        assert_eq!(
            ControlRequest::from_message(&request).unwrap(),
            ControlRequest::Ping
        );
        let reply = ControlResponse::ok().field("message", "pong");
        channel.send(reply.as_message()).unwrap();
        // Peer hangs up afterwards.
        assert!(channel.recv().unwrap().is_none());
    });

    let mut channel = FramedChannel::new(client);
    let reply = channel.call(&ControlRequest::Ping.to_message()).unwrap();
    let reply = ControlResponse::from_message(reply);
    assert!(reply.is_ok());
    assert_eq!(reply.get("message"), Some("pong"));
    drop(channel);

    handle.join().unwrap();
}

#[test]
fn raw_bytes_written_in_pieces() {
    let (mut client, server) = UnixStream::pair().unwrap();
    let payload = b"action:getConfig\nkey:build_host\n";
    let frame = FrameFormat::default().encode(payload).unwrap();

    let writer = thread::spawn(move || {
        for byte in frame {
            client.write_all(&[byte]).unwrap();
        }
    });

    let mut channel = FramedChannel::new(server);
    let got = channel.recv().unwrap().unwrap();
    writer.join().unwrap();
    assert_eq!(got, message([("action", "getConfig"), ("key", "build_host")]));
}

#[test]
fn wide_prefix_channel() {
    let (client, server) = UnixStream::pair().unwrap();
    let format = FrameFormat::new(4).unwrap();
    let mut tx = FramedChannel::with_codec(client, format, LineCodec);
    let mut rx = FramedChannel::with_codec(server, format, LineCodec);

    let big = "v".repeat(70_000);
    let sent = message([("blob", big.as_str())]);
    let writer = thread::spawn(move || tx.send(&sent).unwrap());
    let got = rx.recv().unwrap().unwrap();
    writer.join().unwrap();
    assert_eq!(got["blob"].len(), 70_000);
}
