use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use localrpc::{
    links, owner_tid, process, serve, shutdown, spawn, Error, Handler, Request, Response,
    ServeConfig, Step, Tid,
};

struct Quiet;

impl Handler for Quiet {
    fn handle(&mut self, _request: &Request) -> Response {
        Response::success("")
    }
}

#[test]
fn owner_death_escalates_out_of_an_indifferent_handler() {
    let _ = env_logger::builder().is_test(true).try_init();
    let (report, collect) = mpsc::channel();
    spawn(report, |report| {
        let inner = report.clone();
        spawn(inner, |report| {
            let owner = owner_tid().unwrap();
            let err = serve(&mut Quiet, ServeConfig::default()).unwrap_err();
            report.send(err == Error::OwnerTerminated(owner)).unwrap();
        });
        // The parent returns right away; its cleanup delivers the notice.
    });
    assert!(collect.recv_timeout(Duration::from_secs(5)).unwrap());
}

struct OwnerWatch {
    report: mpsc::Sender<Tid>,
}

impl Handler for OwnerWatch {
    fn handle(&mut self, _request: &Request) -> Response {
        Response::success("")
    }

    fn on_owner_terminated(&mut self, owner: &Tid) -> bool {
        self.report.send(owner.clone()).unwrap();
        true
    }
}

#[test]
fn a_consumed_owner_notice_keeps_the_loop_alive() {
    let (report, collect) = mpsc::channel();
    let (announce, child_tid) = mpsc::channel();
    let parent = spawn((report, announce), |(report, announce)| {
        let me = localrpc::this_tid();
        let child = spawn(report, |report| {
            serve(&mut OwnerWatch { report }, ServeConfig::default()).unwrap();
        });
        announce.send((me, child)).unwrap();
    });
    let (parent_seen, child) = child_tid.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(parent_seen, parent);

    // The child consumes the notice and keeps serving afterwards.
    let dead_owner = collect.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(dead_owner, parent);
    assert!(localrpc::query(&child, Request::new("ping", "")).is_success());
    shutdown(&child);
}

struct LinkWatch {
    dead: Option<Tid>,
}

impl Handler for LinkWatch {
    fn handle(&mut self, _request: &Request) -> Response {
        Response::success("")
    }

    fn on_link_dead(&mut self, peer: &Tid) -> bool {
        self.dead = Some(peer.clone());
        true
    }
}

#[test]
fn link_death_is_delivered_once_and_unlinks_the_peer() {
    let (report, collect) = mpsc::channel();
    spawn(report, |report| {
        let me = localrpc::this_tid();
        let quick = spawn((), |_| {});
        let keeper = spawn((), |_| thread::sleep(Duration::from_secs(2)));

        let mut watch = LinkWatch { dead: None };
        while watch.dead.is_none() {
            match process(&me, &mut watch).unwrap() {
                Step::Empty => thread::sleep(Duration::from_millis(1)),
                _ => {}
            }
        }
        report
            .send((
                watch.dead == Some(quick.clone()),
                !links().contains(&quick),
                links().contains(&keeper),
            ))
            .unwrap();
    });
    let (saw_quick, quick_unlinked, keeper_still_linked) =
        collect.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(saw_quick);
    assert!(quick_unlinked);
    assert!(keeper_still_linked);
}

#[test]
fn a_panicking_thread_still_notifies_its_links() {
    let (report, collect) = mpsc::channel();
    spawn(report, |report| {
        let me = localrpc::this_tid();
        let doomed = spawn((), |_| panic!("deliberate test panic"));

        let mut watch = LinkWatch { dead: None };
        while watch.dead.is_none() {
            match process(&me, &mut watch).unwrap() {
                Step::Empty => thread::sleep(Duration::from_millis(1)),
                _ => {}
            }
        }
        report.send(watch.dead == Some(doomed)).unwrap();
    });
    assert!(collect.recv_timeout(Duration::from_secs(5)).unwrap());
}

#[test]
fn unlinked_handlers_see_unconsumed_link_deaths_as_errors() {
    let (report, collect) = mpsc::channel();
    spawn(report, |report| {
        let me = localrpc::this_tid();
        let quick = spawn((), |_| {});
        let outcome = loop {
            match process(&me, &mut Quiet) {
                Ok(Step::Empty) => thread::sleep(Duration::from_millis(1)),
                Ok(_) => continue,
                Err(err) => break err,
            }
        };
        report.send(outcome == Error::LinkTerminated(quick)).unwrap();
    });
    assert!(collect.recv_timeout(Duration::from_secs(5)).unwrap());
}
