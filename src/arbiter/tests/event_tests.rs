// Copyright (C) 2025 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use super::common::*;
use crate::arbiter::types::{ChannelType, OverrideRequest};
use crate::effects::manager::EffectTrigger;
use crate::effects::EffectKind;
use crate::events::Event;

#[test]
fn events_are_published_in_tick_order() {
    let (mut arbiter, start) = arbiter_with(vec![rgb_fixture("a", "front")]);
    let events = arbiter.subscribe(32);
    arbiter.set_vibe_provider(club());

    arbiter.set_blackout(true);
    arbiter
        .set_manual_override(OverrideRequest::new("a").set(ChannelType::Dimmer, 1.0))
        .unwrap();
    arbiter
        .trigger_effect(EffectTrigger::new(EffectKind::SolarFlare).source("desk"))
        .unwrap();

    // Nothing is delivered between ticks.
    assert!(events.try_recv().is_err());

    let target = arbiter.arbitrate_at(start);
    let received: Vec<Event> = events.try_iter().collect();
    assert_eq!(received.len(), 4);
    assert!(matches!(
        &received[0],
        Event::EffectTriggered { kind: EffectKind::SolarFlare, source, .. } if source == "desk"
    ));
    assert_eq!(received[1], Event::BlackoutToggled { active: true });
    assert!(matches!(&received[2], Event::OverrideSet { fixture_id, .. } if fixture_id == "a"));
    match &received[3] {
        Event::Output(output) => assert_eq!(**output, target),
        other => panic!("expected output, got {:?}", other),
    }
}

#[test]
fn blocked_and_finished_effects_are_published() {
    let (mut arbiter, start) = arbiter_with(vec![rgb_fixture("a", "front")]);
    let events = arbiter.subscribe(32);

    let outcome = arbiter
        .trigger_effect(EffectTrigger::new(EffectKind::SolarFlare))
        .unwrap();
    assert!(outcome.is_blocked());
    arbiter.arbitrate_at(start);
    assert!(matches!(
        control_events(&events).as_slice(),
        [Event::EffectBlocked { kind: EffectKind::SolarFlare, .. }]
    ));

    arbiter.set_vibe_provider(club());
    arbiter
        .trigger_effect(EffectTrigger::new(EffectKind::SolarFlare))
        .unwrap();
    arbiter.arbitrate_at(start + ms(500));
    control_events(&events);

    arbiter.arbitrate_at(start + ms(1100));
    assert_eq!(
        control_events(&events),
        vec![Event::EffectFinished {
            id: "fx-1".to_string(),
            kind: EffectKind::SolarFlare,
            aborted: false,
        }]
    );
}

#[test]
fn slow_subscribers_never_stall_the_tick() {
    let (mut arbiter, start) = arbiter_with(vec![rgb_fixture("a", "front")]);
    let events = arbiter.subscribe(1);
    for step in 0..10 {
        arbiter.arbitrate_at(start + ms(step * 33));
    }
    assert_eq!(events.len(), 1);
    assert_eq!(arbiter.frame_count(), 10);
}

#[test]
fn dropped_subscribers_are_forgotten() {
    let (mut arbiter, start) = arbiter_with(vec![rgb_fixture("a", "front")]);
    drop(arbiter.subscribe(4));
    let kept = arbiter.subscribe(4);
    arbiter.arbitrate_at(start);
    assert!(matches!(kept.try_recv(), Ok(Event::Output(_))));
}
