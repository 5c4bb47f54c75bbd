//! Event scripts run through the public VM interface.

use jy_core::GameRng;
use jy_core::data::submap::layer;
use jy_core::event::EventVm;
use jy_core::testing::event_session;
use jy_core::ui::{Direction, Key, Notice, UiRequest};
use jy_core::world::{CoreError, Session};

fn session(scripts: Vec<Vec<i16>>) -> Session {
    event_session(scripts, GameRng::new(11))
}

/// Put cell event `index` at `(x, y)` of submap 0 with the given scripts.
fn place_event(session: &mut Session, index: i16, (x, y): (i16, i16), scripts: [i16; 3]) {
    let ev = session.data.event_mut(0, index).unwrap();
    ev.event = scripts;
    ev.x = x;
    ev.y = y;
    session
        .data
        .layers_mut(0)
        .unwrap()
        .set(layer::EVENT as i32, x as i32, y as i32, index);
}

#[test]
fn test_talk_suspends_then_clears() {
    let mut session = session(vec![vec![1, 120, 4, 2]]);
    let mut vm = EventVm::new();
    vm.run_event(&mut session, 0).unwrap();
    assert_eq!(
        vm.take_requests(),
        vec![UiRequest::Talk {
            talk: 120,
            head: 4,
            position: 2
        }]
    );
    assert!(vm.is_running());
    assert_eq!(vm.script_id(), 0);

    vm.continue_events(&mut session, false);
    assert!(!vm.is_running());
    assert_eq!(vm.script_id(), -1);
    assert!(vm.take_requests().is_empty());

    // nothing left to resume
    vm.continue_events(&mut session, true);
    assert!(vm.take_requests().is_empty());
}

#[test]
fn test_missing_script_is_an_error() {
    let mut session = session(vec![]);
    let mut vm = EventVm::new();
    let err = vm.run_event(&mut session, 9).unwrap_err();
    assert!(matches!(err, CoreError::MissingEvent(9)));
}

#[test]
fn test_step_trigger_and_join_offer() {
    // ask to join; on yes, join and hand over items, then disable the event
    let join = vec![
        9, 0, 21, // ask
        10, 2, // join
        3, -1, -1, -2, -2, 0, 0, 0, -1, -1, -1, -2, -1, -1, // clear scripts
    ];
    let mut session = session(vec![vec![], join]);
    session.data.character_mut(2).unwrap().item = [5, -1, -1, -1];
    session.data.character_mut(2).unwrap().item_count = [3, 0, 0, 0];
    place_event(&mut session, 7, (4, 4), [0, 0, 1]);

    let mut vm = EventVm::new();
    vm.enter(0, 4, 3, Direction::Down);
    assert!(!vm.step_on(&mut session));
    vm.enter(0, 4, 4, Direction::Down);
    assert!(vm.step_on(&mut session));
    assert_eq!(vm.take_requests(), vec![UiRequest::YesNo(Notice::AskToJoin)]);

    vm.continue_events(&mut session, true);
    assert_eq!(session.data.party[1], 2);
    assert_eq!(
        vm.take_requests(),
        vec![UiRequest::Message(Notice::ItemGained { item: 5, count: 3 })]
    );
    vm.continue_events(&mut session, false);
    assert!(!vm.is_running());
    assert_eq!(session.data.bag.count(5), 3);
    assert_eq!(session.data.event(0, 7).unwrap().event, [0, 0, 0]);

    // the step script is gone
    assert!(!vm.step_on(&mut session));
}

#[test]
fn test_declined_offer_skips_join() {
    let mut session = session(vec![vec![], vec![9, 0, 2, 10, 2, 32, 8, 1]]);
    let mut vm = EventVm::new();
    vm.run_event(&mut session, 1).unwrap();
    vm.continue_events(&mut session, false);
    assert!(!vm.is_running());
    assert_eq!(session.data.party[1], -1);
    assert_eq!(session.data.bag.count(8), 1);
}

#[test]
fn test_walk_then_face() {
    let mut session = session(vec![vec![30, 2, 2, 2, 5, 40, 1]]);
    let mut vm = EventVm::new();
    vm.enter(0, 2, 2, Direction::Up);
    vm.run_event(&mut session, 0).unwrap();
    let mut frames = 0;
    while vm.is_running() && frames < 10 {
        vm.frame(&mut session);
        frames += 1;
    }
    assert_eq!(frames, 3);
    assert_eq!(vm.position(), (2, 5));
    assert_eq!(vm.direction(), Direction::Right);
}

#[test]
fn test_menu_script() {
    // ram[100] = "a", ram[101] = "b"; menu of 2; store choice at 90;
    // then ram[90] == 2 ? add item 3
    let script = vec![
        50, 0, 100, 0x61, 0, 0, 0, 0, //
        50, 0, 101, 0x62, 0, 0, 0, 0, //
        50, 40, 0, 2, 100, 90, 10, 20, //
        50, 4, 0, 2, 90, 2, 0, 0, //
        36, 256, 0, 3, //
        32, 3, 1,
    ];
    let mut session = session(vec![script]);
    let mut vm = EventVm::new();
    vm.run_event(&mut session, 0).unwrap();
    assert_eq!(
        vm.take_requests(),
        vec![UiRequest::ExtendedMenu {
            items: vec![b"a".to_vec(), b"b".to_vec()],
            x: 10,
            y: 20
        }]
    );
    assert!(!vm.press_key(&mut session, Key::Ok));
    assert!(vm.choose(&mut session, Some(1)));
    assert!(!vm.is_running());
    assert_eq!(session.data.bag.count(3), 1);
}

#[test]
fn test_tournament_ends_with_prize() {
    let mut session = session(vec![vec![58]]);
    let mut vm = EventVm::new();
    vm.enter(0, 1, 1, Direction::Down);
    vm.run_event(&mut session, 0).unwrap();
    let mut battles = Vec::new();
    let mut rounds = 0;
    while vm.is_running() && rounds < 1000 {
        for request in vm.take_requests() {
            if let UiRequest::EnterBattle { battle, dead_on_lose, .. } = request {
                assert!(dead_on_lose);
                battles.push(battle);
            }
        }
        vm.continue_events(&mut session, true);
        rounds += 1;
    }
    assert!(!vm.is_running());
    assert_eq!(battles.len(), 15);
    for (bout, battle) in battles.iter().enumerate() {
        let first = 102 + bout as i16 * 2;
        assert!((first..first + 2).contains(battle));
    }
    assert_eq!(session.data.bag.count(0x8f), 1);
}
