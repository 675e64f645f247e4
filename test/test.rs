// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

#[macro_use]
extern crate log;
extern crate env_logger;
extern crate filament;

use std::collections::HashSet;
use std::io;
use std::time;
use std::thread;

use filament::*;


#[test]
fn test_pipeline_connected_to_bound() {
    let _ = env_logger::init();
    let session = Session::new().unwrap();
    let mut pull = session.create_socket(SocketType::Pull).unwrap();
    let mut push = session.create_socket(SocketType::Push).unwrap();

    pull.bind("tcp://127.0.0.1:5740").unwrap();
    push.connect("tcp://127.0.0.1:5740").unwrap();

    let sent = vec![65, 66, 67];
    push.send(sent).unwrap();
    let received = pull.recv().unwrap();

    assert_eq!(vec![65, 66, 67], received)
}


#[test]
fn test_pipeline_bound_to_connected() {
    let _ = env_logger::init();
    let session = Session::new().unwrap();
    let mut pull = session.create_socket(SocketType::Pull).unwrap();
    let mut push = session.create_socket(SocketType::Push).unwrap();

    push.bind("tcp://127.0.0.1:5741").unwrap();
    pull.connect("tcp://127.0.0.1:5741").unwrap();

    let sent = vec![65, 66, 67];
    push.send(sent).unwrap();
    let received = pull.recv().unwrap();

    assert_eq!(vec![65, 66, 67], received)
}


#[test]
fn test_send_while_not_connected() {
    let _ = env_logger::init();
    let session = Session::new().unwrap();
    let mut push = session.create_socket(SocketType::Push).unwrap();
    let mut pull = session.create_socket(SocketType::Pull).unwrap();
    let timeout = time::Duration::from_millis(500);

    let recver = thread::spawn(move || {
        thread::sleep(time::Duration::from_millis(50));
        pull.connect("tcp://127.0.0.1:5742").unwrap();
        let received = pull.recv().unwrap();
        assert_eq!(vec![65, 66, 67], received)
    });

    push.set_send_timeout(timeout).unwrap();
    push.bind("tcp://127.0.0.1:5742").unwrap();
    push.send(vec![65, 66, 67]).unwrap();
    info!("test_send_while_not_connected: msg sent");

    recver.join().unwrap();
}


#[test]
fn test_send_timeout() {
    let _ = env_logger::init();
    let session = Session::new().unwrap();
    let mut push = session.create_socket(SocketType::Push).unwrap();
    let timeout = time::Duration::from_millis(50);

    push.bind("tcp://127.0.0.1:5743").unwrap();
    push.set_send_timeout(timeout).unwrap();

    let err = push.send(vec![65, 66, 67]).unwrap_err();

    assert_eq!(io::ErrorKind::TimedOut, err.kind());
}


#[test]
fn test_recv_while_not_connected() {
    let _ = env_logger::init();
    let session = Session::new().unwrap();
    let mut pull = session.create_socket(SocketType::Pull).unwrap();
    let mut push = session.create_socket(SocketType::Push).unwrap();
    let timeout = time::Duration::from_millis(500);

    pull.set_recv_timeout(timeout).unwrap();
    pull.bind("tcp://127.0.0.1:5744").unwrap();

    let sender = thread::spawn(move || {
        thread::sleep(time::Duration::from_millis(50));
        push.connect("tcp://127.0.0.1:5744").unwrap();
        push.send(vec![65, 66, 67]).unwrap();
    });

    let received = pull.recv().unwrap();
    assert_eq!(vec![65, 66, 67], received);

    sender.join().unwrap();
}


#[test]
fn test_recv_timeout() {
    let _ = env_logger::init();
    let session = Session::new().unwrap();
    let mut pull = session.create_socket(SocketType::Pull).unwrap();
    let mut push = session.create_socket(SocketType::Push).unwrap();
    let timeout = time::Duration::from_millis(50);

    pull.set_recv_timeout(timeout).unwrap();
    pull.bind("tcp://127.0.0.1:5745").unwrap();
    push.connect("tcp://127.0.0.1:5745").unwrap();

    let err = pull.recv().unwrap_err();

    assert_eq!(io::ErrorKind::TimedOut, err.kind());
}


#[test]
fn test_pair_connected_to_bound() {
    let _ = env_logger::init();
    let session = Session::new().unwrap();
    let mut bound = session.create_socket(SocketType::Pair).unwrap();
    let mut connected = session.create_socket(SocketType::Pair).unwrap();

    bound.set_recv_timeout(time::Duration::from_millis(500)).unwrap();
    bound.bind("tcp://127.0.0.1:5746").unwrap();

    connected.set_send_timeout(time::Duration::from_millis(500)).unwrap();
    connected.connect("tcp://127.0.0.1:5746").unwrap();

    let sent = vec![65, 66, 67];
    connected.send(sent).unwrap();
    let received = bound.recv().unwrap();

    assert_eq!(vec![65, 66, 67], received)
}


#[test]
fn test_pair_bound_to_connected() {
    let _ = env_logger::init();
    let session = Session::new().unwrap();
    let mut bound = session.create_socket(SocketType::Pair).unwrap();
    let mut connected = session.create_socket(SocketType::Pair).unwrap();

    bound.set_send_timeout(time::Duration::from_millis(500)).unwrap();
    bound.bind("tcp://127.0.0.1:5747").unwrap();

    connected.set_recv_timeout(time::Duration::from_millis(500)).unwrap();
    connected.connect("tcp://127.0.0.1:5747").unwrap();

    let sent = vec![65, 66, 67];
    bound.send(sent).unwrap();
    let received = connected.recv().unwrap();

    assert_eq!(vec![65, 66, 67], received)
}


#[test]
fn test_req_rep() {
    let _ = env_logger::init();
    let session = Session::new().unwrap();
    let mut server = session.create_socket(SocketType::Rep).unwrap();
    let mut client = session.create_socket(SocketType::Req).unwrap();

    server.bind("tcp://127.0.0.1:5748").unwrap();
    client.connect("tcp://127.0.0.1:5748").unwrap();

    let client_request = vec![65, 66, 67];
    client.send(client_request).unwrap();

    let server_request = server.recv().unwrap();
    assert_eq!(vec![65, 66, 67], server_request);

    let server_reply = vec![67, 66, 65];
    server.send(server_reply).unwrap();

    let client_reply = client.recv().unwrap();

    assert_eq!(vec![67, 66, 65], client_reply);
}


#[test]
fn test_pub_sub() {
    let _ = env_logger::init();
    let session = Session::new().unwrap();
    let mut server = session.create_socket(SocketType::Pub).unwrap();
    let mut client = session.create_socket(SocketType::Sub).unwrap();
    let timeout = time::Duration::from_millis(50);

    server.bind("tcp://127.0.0.1:5749").unwrap();
    client.connect("tcp://127.0.0.1:5749").unwrap();
    client.set_recv_timeout(timeout).unwrap();
    client.set_option(SocketOption::Subscribe(b"A".to_vec())).unwrap();
    client.set_option(SocketOption::Subscribe(b"B".to_vec())).unwrap();

    thread::sleep(time::Duration::from_millis(500));

    server.send(vec![65, 66, 67]).unwrap();
    let received_a = client.recv().unwrap();
    assert_eq!(vec![65, 66, 67], received_a);

    server.send(vec![66, 65, 67]).unwrap();
    let received_b = client.recv().unwrap();
    assert_eq!(vec![66, 65, 67], received_b);

    server.send(vec![67, 66, 65]).unwrap();
    let not_received_c = client.recv().unwrap_err();
    assert_eq!(io::ErrorKind::TimedOut, not_received_c.kind());
}


#[test]
fn test_pub_sub_filtering() {
    let _ = env_logger::init();
    let session = Session::new().unwrap();
    let mut publisher = session.create_socket(SocketType::Pub).unwrap();
    let mut subscriber = session.create_socket(SocketType::Sub).unwrap();
    let timeout = time::Duration::from_millis(50);

    publisher.bind("inproc://filtering").unwrap();
    subscriber.connect("inproc://filtering").unwrap();
    subscriber.set_recv_timeout(timeout).unwrap();
    subscriber.set_option(SocketOption::Subscribe(b"foo".to_vec())).unwrap();

    publisher.send(b"foobar".to_vec()).unwrap();
    publisher.send(b"bar".to_vec()).unwrap();
    publisher.send(b"foo".to_vec()).unwrap();

    assert_eq!(b"foobar".to_vec(), subscriber.recv().unwrap());
    assert_eq!(b"foo".to_vec(), subscriber.recv().unwrap());
    assert_eq!(io::ErrorKind::TimedOut, subscriber.recv().unwrap_err().kind());
}


#[test]
fn test_bus() {
    let _ = env_logger::init();
    let session = Session::new().unwrap();
    let mut server = session.create_socket(SocketType::Bus).unwrap();
    let mut client1 = session.create_socket(SocketType::Bus).unwrap();
    let mut client2 = session.create_socket(SocketType::Bus).unwrap();
    let timeout = time::Duration::from_millis(250);

    server.bind("tcp://127.0.0.1:5750").unwrap();
    client1.connect("tcp://127.0.0.1:5750").unwrap();
    client2.connect("tcp://127.0.0.1:5750").unwrap();
    client1.set_recv_timeout(timeout).unwrap();
    client2.set_recv_timeout(timeout).unwrap();

    thread::sleep(time::Duration::from_millis(500));

    let sent = vec![65, 66, 67];
    server.send(sent).expect("Server should have send a msg");
    let received1 = client1.recv().expect("Client #1 should have received the msg");
    assert_eq!(vec![65, 66, 67], received1);
    let received2 = client2.recv().expect("Client #2 should have received the msg");
    assert_eq!(vec![65, 66, 67], received2);
}


#[test]
fn test_survey() {
    let _ = env_logger::init();
    let session = Session::new().unwrap();
    let mut server = session.create_socket(SocketType::Surveyor).unwrap();
    let mut client1 = session.create_socket(SocketType::Respondent).unwrap();
    let mut client2 = session.create_socket(SocketType::Respondent).unwrap();
    let timeout = time::Duration::from_millis(250);

    server.bind("tcp://127.0.0.1:5751").unwrap();
    client1.connect("tcp://127.0.0.1:5751").unwrap();
    client2.connect("tcp://127.0.0.1:5751").unwrap();
    client1.set_recv_timeout(timeout).unwrap();
    client2.set_recv_timeout(timeout).unwrap();
    server.set_recv_timeout(timeout).unwrap();

    thread::sleep(time::Duration::from_millis(500));

    let server_survey = vec![65, 66, 67];
    server.send(server_survey).expect("Server should have send a survey");

    let client1_survey = client1.recv().expect("Client #1 should have received the survey");
    assert_eq!(vec![65, 66, 67], client1_survey);

    let client2_survey = client2.recv().expect("Client #2 should have received the survey");
    assert_eq!(vec![65, 66, 67], client2_survey);

    client1.send(vec![65, 66, 65]).expect("Client #1 should have send a vote");
    let server_resp1 = server.recv().expect("Server should have received the vote from client #1");
    assert_eq!(vec![65, 66, 65], server_resp1);

    client2.send(vec![67, 66, 67]).expect("Client #2 should have send a vote");
    let server_resp2 = server.recv().expect("Server should have received the vote from client #2");
    assert_eq!(vec![67, 66, 67], server_resp2);
}


#[test]
fn test_send_reply_before_send_request() {
    let _ = env_logger::init();
    let session = Session::new().unwrap();
    let mut server = session.create_socket(SocketType::Rep).unwrap();

    server.bind("tcp://127.0.0.1:5752").unwrap();
    server.send(vec![67, 66, 65]).unwrap_err();
}


#[test]
fn test_recv_reply_before_send_request() {
    let _ = env_logger::init();
    let session = Session::new().unwrap();
    let mut server = session.create_socket(SocketType::Rep).unwrap();
    let mut client = session.create_socket(SocketType::Req).unwrap();

    server.bind("tcp://127.0.0.1:5753").unwrap();
    client.connect("tcp://127.0.0.1:5753").unwrap();

    let err = client.recv().unwrap_err();
    assert_eq!(io::ErrorKind::Other, err.kind());
}


#[test]
fn test_survey_deadline() {
    let _ = env_logger::init();
    let session = Session::new().unwrap();
    let mut server = session.create_socket(SocketType::Surveyor).unwrap();
    let mut fast = session.create_socket(SocketType::Respondent).unwrap();
    let mut slow = session.create_socket(SocketType::Respondent).unwrap();
    let deadline = time::Duration::from_millis(100);
    let timeout = time::Duration::from_millis(500);

    server.set_option(SocketOption::SurveyDeadline(deadline)).unwrap();
    server.set_recv_timeout(timeout).unwrap();
    server.bind("inproc://deadline").unwrap();
    fast.connect("inproc://deadline").unwrap();
    slow.connect("inproc://deadline").unwrap();

    server.send(b"q?".to_vec()).unwrap();

    assert_eq!(b"q?".to_vec(), fast.recv().unwrap());
    fast.send(b"a1".to_vec()).unwrap();
    assert_eq!(b"a1".to_vec(), server.recv().unwrap());

    assert_eq!(b"q?".to_vec(), slow.recv().unwrap());
    thread::sleep(time::Duration::from_millis(200));
    slow.send(b"a2".to_vec()).unwrap();

    // the survey expired: the late response must never come out
    let err = server.recv().unwrap_err();
    assert_eq!(io::ErrorKind::Other, err.kind());
}


#[cfg(not(windows))]
#[test]
fn test_ipc() {
    let _ = env_logger::init();
    let session = Session::new().unwrap();
    let mut bound = session.create_socket(SocketType::Pair).unwrap();
    let mut connected = session.create_socket(SocketType::Pair).unwrap();

    bound.bind("ipc:///tmp/test_filament_ipc.ipc").unwrap();
    connected.connect("ipc:///tmp/test_filament_ipc.ipc").unwrap();

    connected.send(vec![65, 66, 67]).unwrap();
    let received = bound.recv().unwrap();
    assert_eq!(vec![65, 66, 67], received);

    bound.send(vec![67, 66, 65]).unwrap();
    let received = connected.recv().unwrap();
    assert_eq!(vec![67, 66, 65], received);
}


#[test]
fn test_req_rep_inproc() {
    let _ = env_logger::init();
    let session = Session::new().unwrap();
    let mut server = session.create_socket(SocketType::Rep).unwrap();
    let mut client = session.create_socket(SocketType::Req).unwrap();

    server.bind("inproc://reqrep").unwrap();
    client.connect("inproc://reqrep").unwrap();

    client.send(b"ping".to_vec()).unwrap();
    assert_eq!(b"ping".to_vec(), server.recv().unwrap());

    server.send(b"pong".to_vec()).unwrap();
    assert_eq!(b"pong".to_vec(), client.recv().unwrap());
}


#[test]
fn test_req_resend_after_peer_restart() {
    let _ = env_logger::init();
    let session = Session::new().unwrap();
    let mut client = session.create_socket(SocketType::Req).unwrap();
    let resend_ivl = time::Duration::from_millis(100);

    client.set_option(SocketOption::ResendInterval(resend_ivl)).unwrap();
    client.set_recv_timeout(time::Duration::from_millis(1000)).unwrap();

    let mut server = session.create_socket(SocketType::Rep).unwrap();
    server.bind("inproc://restart").unwrap();
    client.connect("inproc://restart").unwrap();

    client.send(b"x".to_vec()).unwrap();

    // the server goes away before picking the request up
    drop(server);

    let mut revived = session.create_socket(SocketType::Rep).unwrap();
    revived.set_recv_timeout(time::Duration::from_millis(1000)).unwrap();
    revived.bind("inproc://restart").unwrap();

    // the re-send timer delivers the request to the revived server
    let request = revived.recv().expect("the request should have been re-sent");
    assert_eq!(b"x".to_vec(), request);

    revived.send(b"y".to_vec()).unwrap();
    assert_eq!(b"y".to_vec(), client.recv().unwrap());
}


#[test]
fn test_xrep_routes_by_backtrace() {
    let _ = env_logger::init();
    let session = Session::new().unwrap();
    let mut device = session.create_raw_socket(SocketType::Rep).unwrap();
    let mut client_a = session.create_socket(SocketType::Req).unwrap();
    let mut client_b = session.create_socket(SocketType::Req).unwrap();

    device.set_recv_timeout(time::Duration::from_millis(500)).unwrap();
    device.bind("inproc://routing").unwrap();
    client_a.connect("inproc://routing").unwrap();
    client_b.connect("inproc://routing").unwrap();
    client_a.set_recv_timeout(time::Duration::from_millis(500)).unwrap();

    client_a.send(b"A".to_vec()).unwrap();
    client_b.send(b"B".to_vec()).unwrap();

    let first = device.recv_msg().unwrap();
    let second = device.recv_msg().unwrap();

    // each request carries its pipe key on top of the request id
    assert_eq!(8, first.header.len());
    assert_eq!(8, second.header.len());
    assert!(first.header.as_slice()[..4] != second.header.as_slice()[..4]);

    let (msg_a, msg_b) = if first.body.as_slice() == b"A" {
        (first, second)
    } else {
        (second, first)
    };
    assert_eq!(b"A", msg_a.body.as_slice());
    assert_eq!(b"B", msg_b.body.as_slice());

    // a reply wearing the stored header goes back to that peer only
    let reply = Message::with_header_and_body(
        msg_a.header.to_vec(), Chunk::from_vec(b"A'".to_vec()));
    device.send_msg(reply).unwrap();

    assert_eq!(b"A'".to_vec(), client_a.recv().unwrap());
    assert_eq!(io::ErrorKind::WouldBlock, client_b.try_recv().unwrap_err().kind());
}


#[test]
fn test_push_pull_fan_out_fairness() {
    let _ = env_logger::init();
    let session = Session::new().unwrap();
    let mut push = session.create_socket(SocketType::Push).unwrap();
    let mut pull1 = session.create_socket(SocketType::Pull).unwrap();
    let mut pull2 = session.create_socket(SocketType::Pull).unwrap();
    let timeout = time::Duration::from_millis(500);

    pull1.set_recv_timeout(timeout).unwrap();
    pull2.set_recv_timeout(timeout).unwrap();
    pull1.bind("inproc://fanout-1").unwrap();
    pull2.bind("inproc://fanout-2").unwrap();
    push.connect("inproc://fanout-1").unwrap();
    push.connect("inproc://fanout-2").unwrap();

    for i in 0..10 {
        push.send(format!("m{}", i).into_bytes()).unwrap();
    }

    let mut seen = HashSet::new();
    for _ in 0..5 {
        assert!(seen.insert(pull1.recv().unwrap()));
    }
    for _ in 0..5 {
        assert!(seen.insert(pull2.recv().unwrap()));
    }

    assert_eq!(io::ErrorKind::WouldBlock, pull1.try_recv().unwrap_err().kind());
    assert_eq!(io::ErrorKind::WouldBlock, pull2.try_recv().unwrap_err().kind());

    let expected: HashSet<Vec<u8>> =
        (0..10).map(|i| format!("m{}", i).into_bytes()).collect();
    assert_eq!(expected, seen);
}


#[test]
fn test_sink_gathers_from_all_sources() {
    let _ = env_logger::init();
    let session = Session::new().unwrap();
    let mut sink = session.create_socket(SocketType::Sink).unwrap();
    let mut source1 = session.create_socket(SocketType::Source).unwrap();
    let mut source2 = session.create_socket(SocketType::Source).unwrap();

    sink.set_recv_timeout(time::Duration::from_millis(250)).unwrap();
    sink.bind("inproc://gather").unwrap();
    source1.connect("inproc://gather").unwrap();
    source2.connect("inproc://gather").unwrap();

    source1.send(vec![1]).unwrap();
    source2.send(vec![2]).unwrap();

    let mut received = vec![sink.recv().unwrap(), sink.recv().unwrap()];
    received.sort();

    assert_eq!(vec![vec![1], vec![2]], received);
}


#[test]
fn test_master_replicates_state_to_mirrors() {
    let _ = env_logger::init();
    let session = Session::new().unwrap();
    let mut master = session.create_socket(SocketType::Master).unwrap();
    let mut mirror = session.create_socket(SocketType::Mirror).unwrap();
    let timeout = time::Duration::from_millis(100);

    master.bind("inproc://replication").unwrap();
    mirror.connect("inproc://replication").unwrap();
    mirror.set_recv_timeout(timeout).unwrap();

    // a joining mirror is synchronised with the current state,
    // which starts out empty
    assert_eq!(Vec::<u8>::new(), mirror.recv().unwrap());

    master.send(b"s1".to_vec()).unwrap();
    assert_eq!(b"s1".to_vec(), mirror.recv().unwrap());

    // re-sending an unchanged state is suppressed
    master.send(b"s1".to_vec()).unwrap();
    assert_eq!(io::ErrorKind::TimedOut, mirror.recv().unwrap_err().kind());

    // a late mirror catches up without waiting for the next change
    let mut late = session.create_socket(SocketType::Mirror).unwrap();
    late.set_recv_timeout(timeout).unwrap();
    late.connect("inproc://replication").unwrap();
    assert_eq!(b"s1".to_vec(), late.recv().unwrap());

    master.send(b"s2".to_vec()).unwrap();
    assert_eq!(b"s2".to_vec(), mirror.recv().unwrap());
    assert_eq!(b"s2".to_vec(), late.recv().unwrap());
}


#[test]
fn test_pair_rejects_a_second_peer() {
    let _ = env_logger::init();
    let session = Session::new().unwrap();
    let mut bound = session.create_socket(SocketType::Pair).unwrap();
    let mut first = session.create_socket(SocketType::Pair).unwrap();
    let mut second = session.create_socket(SocketType::Pair).unwrap();

    bound.bind("inproc://couple").unwrap();
    first.connect("inproc://couple").unwrap();

    let err = second.connect("inproc://couple").unwrap_err();
    assert_eq!(io::ErrorKind::AlreadyExists, err.kind());

    // the established couple keeps working
    first.send(vec![65]).unwrap();
    assert_eq!(vec![65], bound.recv().unwrap());
}


#[test]
fn test_readiness_descriptors() {
    let _ = env_logger::init();
    let session = Session::new().unwrap();
    let publisher = session.create_socket(SocketType::Pub).unwrap();
    let puller = session.create_socket(SocketType::Pull).unwrap();

    assert!(publisher.send_fd().is_ok());
    assert!(publisher.recv_fd().is_err());
    assert!(puller.recv_fd().is_ok());
    assert!(puller.send_fd().is_err());
}


#[test]
fn test_endpoint_shutdown_detaches_the_peer() {
    let _ = env_logger::init();
    let session = Session::new().unwrap();
    let mut bound = session.create_socket(SocketType::Pair).unwrap();
    let mut connected = session.create_socket(SocketType::Pair).unwrap();

    bound.bind("inproc://detach").unwrap();
    let endpoint = connected.connect("inproc://detach").unwrap();

    connected.send(vec![1]).unwrap();
    assert_eq!(vec![1], bound.recv().unwrap());

    endpoint.shutdown().unwrap();
    thread::sleep(time::Duration::from_millis(100));

    let err = bound.try_send(vec![2]).unwrap_err();
    assert_eq!(io::ErrorKind::WouldBlock, err.kind());
}


#[test]
fn test_termination_wakes_blocked_receivers() {
    let _ = env_logger::init();
    let session = Session::new().unwrap();
    let mut pull = session.create_socket(SocketType::Pull).unwrap();

    pull.bind("inproc://termination").unwrap();

    let blocked = thread::spawn(move || {
        let err = pull.recv().unwrap_err();
        assert_eq!(io::ErrorKind::Other, err.kind());
    });

    thread::sleep(time::Duration::from_millis(100));
    drop(session);

    blocked.join().unwrap();
}


#[test]
fn test_bad_addresses_are_rejected() {
    let _ = env_logger::init();
    let session = Session::new().unwrap();
    let mut pair = session.create_socket(SocketType::Pair).unwrap();

    assert!(pair.bind("carrier-pigeon://coop").is_err());
    assert!(pair.bind("no-separator").is_err());

    let long = format!("inproc://{}", "x".repeat(200));
    assert!(pair.bind(&long).is_err());

    // binding the same inproc name twice is a conflict
    pair.bind("inproc://taken").unwrap();
    let mut other = session.create_socket(SocketType::Pair).unwrap();
    let err = other.bind("inproc://taken").unwrap_err();
    assert_eq!(io::ErrorKind::AddrInUse, err.kind());
}
