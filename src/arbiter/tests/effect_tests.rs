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
use crate::arbiter::types::{ChannelType, ControlLayer, OverrideRequest};
use crate::arbiter::ArbiterError;
use crate::effects::library::seismic_snap::SeismicSnapParams;
use crate::effects::library::EffectParams;
use crate::effects::manager::{EffectTrigger, TriggerOutcome};
use crate::effects::{EffectError, EffectKind};

#[test]
fn flare_wins_dimmer_by_highest_value() {
    let (mut arbiter, start) = arbiter_with(vec![rgb_fixture("a", "front")]);
    arbiter.set_vibe_provider(club());
    arbiter.set_ai_intent(intent(0.2, RED));
    let outcome = arbiter
        .trigger_effect(EffectTrigger::new(EffectKind::SolarFlare))
        .unwrap();
    assert_eq!(outcome.id(), Some("fx-1"));

    let target = arbiter.arbitrate_at(start + ms(200));
    let fixture = target.fixture("a").unwrap();
    assert_eq!(fixture.dimmer(), 255);
    assert_eq!(fixture.winner(ChannelType::Dimmer), ControlLayer::Effects);
    // Colour is latest-takes-precedence and the effect is newer than the AI.
    assert_eq!(fixture.rgb(), (255, 255, 255));
    assert_eq!(fixture.winner(ChannelType::Red), ControlLayer::Effects);
    assert!(target.global_effects.blinder_active);
    assert_eq!(target.layers.effects, 1);
}

#[test]
fn lower_effect_value_loses_to_ai_on_htp_channels() {
    let (mut arbiter, start) = arbiter_with(vec![rgb_fixture("a", "front")]);
    arbiter.set_vibe_provider(club());
    arbiter.set_ai_intent(intent(1.0, RED));
    arbiter
        .trigger_effect(EffectTrigger::new(EffectKind::SolarFlare).intensity(0.25))
        .unwrap();

    let target = arbiter.arbitrate_at(start + ms(200));
    let fixture = target.fixture("a").unwrap();
    assert_eq!(fixture.dimmer(), 255);
    assert_eq!(fixture.winner(ChannelType::Dimmer), ControlLayer::Ai);
}

#[test]
fn effects_do_not_touch_claimed_channels() {
    let (mut arbiter, start) = arbiter_with(vec![rgb_fixture("a", "front")]);
    arbiter.set_vibe_provider(club());
    arbiter
        .set_manual_override(OverrideRequest::new("a").set(ChannelType::Dimmer, 10.0))
        .unwrap();
    arbiter
        .trigger_effect(EffectTrigger::new(EffectKind::SolarFlare))
        .unwrap();

    let fixture = arbiter.arbitrate_at(start + ms(200)).fixture("a").unwrap().clone();
    assert_eq!(fixture.dimmer(), 10);
    assert_eq!(fixture.winner(ChannelType::Dimmer), ControlLayer::Manual);
    assert_eq!(fixture.winner(ChannelType::Red), ControlLayer::Effects);
}

#[test]
fn dictatorial_effect_zeroes_unspecified_light_channels() {
    let (mut arbiter, start) =
        arbiter_with(vec![rgb_fixture("a", "front"), mover_fixture("m", "movers")]);
    arbiter.set_vibe_provider(club());
    arbiter.set_ai_intent(intent(1.0, RED));
    arbiter
        .trigger_effect(EffectTrigger::new(EffectKind::SeismicSnap))
        .unwrap();

    // Pre-blackout phase: only the dimmer is specified.
    let target = arbiter.arbitrate_at(start + ms(100));
    let par = target.fixture("a").unwrap();
    assert_eq!(par.dimmer(), 0);
    assert_eq!(par.rgb(), (0, 0, 0));
    assert_eq!(par.winner(ChannelType::Dimmer), ControlLayer::Effects);
    assert_eq!(par.winner(ChannelType::Red), ControlLayer::Effects);
    // Position is not a light channel and keeps the base.
    let mover = target.fixture("m").unwrap();
    assert_eq!(mover.pan_tilt(), (128, 128));
    assert_eq!(mover.winner(ChannelType::Pan), ControlLayer::Ai);

    // Snap phase: full white with a relative tilt kick.
    let target = arbiter.arbitrate_at(start + ms(300));
    let mover = target.fixture("m").unwrap();
    assert_eq!(mover.dimmer(), 255);
    assert_eq!(mover.value(ChannelType::White), 255);
    assert_eq!(mover.rgb(), (255, 255, 255));
    assert_eq!(mover.pan_tilt(), (128, 89));
    assert_eq!(mover.winner(ChannelType::Tilt), ControlLayer::Effects);
}

#[test]
fn dictator_blocks_ambient_with_reason() {
    let (mut arbiter, _) = arbiter_with(vec![rgb_fixture("a", "front")]);
    arbiter.set_vibe_provider(club());
    arbiter
        .trigger_effect(EffectTrigger::new(EffectKind::SeismicSnap))
        .unwrap();

    let outcome = arbiter
        .trigger_effect(EffectTrigger::new(EffectKind::GhostBreath))
        .unwrap();
    match outcome {
        TriggerOutcome::Blocked { reason } => {
            assert!(reason.contains("seismic_snap"));
            assert!(reason.contains("fx-1"));
        }
        other => panic!("expected a block, got {:?}", other),
    }
}

#[test]
fn zone_scoped_effects_leave_other_zones_alone() {
    let (mut arbiter, start) =
        arbiter_with(vec![rgb_fixture("f", "front"), rgb_fixture("b", "back")]);
    arbiter.set_vibe_provider(club());
    arbiter
        .trigger_effect(EffectTrigger::new(EffectKind::SolarFlare).zones(&["back"]))
        .unwrap();

    let target = arbiter.arbitrate_at(start + ms(200));
    assert_eq!(target.fixture("f").unwrap().dimmer(), 0);
    assert_eq!(target.fixture("b").unwrap().dimmer(), 255);
}

#[test]
fn freeze_holds_the_previous_frame() {
    let (mut arbiter, start) = arbiter_with(vec![rgb_fixture("a", "front")]);
    arbiter.set_vibe_provider(club());
    arbiter.set_ai_intent(intent(1.0, RED));
    assert_eq!(arbiter.arbitrate_at(start).fixture("a").unwrap().rgb(), (255, 0, 0));

    arbiter
        .trigger_effect(EffectTrigger::new(EffectKind::Freeze))
        .unwrap();
    arbiter.set_ai_intent(intent(1.0, BLUE));
    let target = arbiter.arbitrate_at(start + ms(100));
    assert!(target.global_effects.freeze_active);
    assert_eq!(target.fixture("a").unwrap().rgb(), (255, 0, 0));

    // Blackout still wins over a freeze.
    arbiter.set_blackout(true);
    let target = arbiter.arbitrate_at(start + ms(133));
    assert_eq!(target.fixture("a").unwrap().dimmer(), 0);
    arbiter.set_blackout(false);

    assert_eq!(arbiter.abort_effect_kind(EffectKind::Freeze), 1);
    let target = arbiter.arbitrate_at(start + ms(166));
    assert!(!target.global_effects.freeze_active);
    assert_eq!(target.fixture("a").unwrap().rgb(), (0, 0, 255));
}

#[test]
fn freeze_still_honours_grand_master_and_manual() {
    let (mut arbiter, start) = arbiter_with(vec![rgb_fixture("a", "front")]);
    arbiter.set_vibe_provider(club());
    arbiter.set_ai_intent(intent(1.0, RED));
    arbiter.arbitrate_at(start);

    arbiter
        .trigger_effect(EffectTrigger::new(EffectKind::Freeze))
        .unwrap();
    arbiter.set_grand_master(0.0).unwrap();
    arbiter
        .set_manual_override(OverrideRequest::new("a").set(ChannelType::Red, 7.0))
        .unwrap();
    arbiter.set_ai_intent(intent(0.2, BLUE));

    let target = arbiter.arbitrate_at(start + ms(100));
    assert!(target.global_effects.freeze_active);
    let fixture = target.fixture("a").unwrap();
    assert_eq!(fixture.dimmer(), 0);
    assert_eq!(fixture.rgb(), (7, 0, 0));
    assert_eq!(fixture.winner(ChannelType::Red), ControlLayer::Manual);

    // The held dimmer comes back at full grand master, not the new AI level.
    arbiter.set_grand_master(1.0).unwrap();
    let target = arbiter.arbitrate_at(start + ms(133));
    let fixture = target.fixture("a").unwrap();
    assert_eq!(fixture.dimmer(), 255);
    assert_eq!(fixture.rgb(), (7, 0, 0));
}

#[test]
fn strobe_is_reported_in_the_summary() {
    let (mut arbiter, start) = arbiter_with(vec![rgb_fixture("a", "front")]);
    arbiter.set_vibe_provider(club());
    arbiter
        .trigger_effect(EffectTrigger::new(EffectKind::StrobeStorm))
        .unwrap();

    let target = arbiter.arbitrate_at(start + ms(300));
    assert!(target.global_effects.strobe_active);
    assert_eq!(target.global_effects.strobe_rate, 8.0);

    let target = arbiter.arbitrate_at(start + ms(1000));
    assert!(!target.global_effects.strobe_active);
    assert_eq!(target.layers.effects, 0);
}

#[test]
fn without_a_vibe_everything_is_blocked() {
    let (mut arbiter, _) = arbiter_with(vec![rgb_fixture("a", "front")]);
    let outcome = arbiter
        .trigger_effect(EffectTrigger::new(EffectKind::SolarFlare))
        .unwrap();
    assert!(outcome.is_blocked());
    assert!(arbiter.effects().is_empty());
}

#[test]
fn bad_parameters_are_errors() {
    let (mut arbiter, _) = arbiter_with(vec![rgb_fixture("a", "front")]);
    arbiter.set_vibe_provider(club());
    let params = EffectParams::SeismicSnap(SeismicSnapParams {
        tilt_kick: 2.0,
        ..Default::default()
    });
    assert!(matches!(
        arbiter.trigger_effect(EffectTrigger::with_params(params)),
        Err(ArbiterError::Effect(EffectError::InvalidParameter(_)))
    ));
    assert!(arbiter.effects().is_empty());
}

#[test]
fn max_duration_and_abort_end_effects_on_the_next_tick() {
    let (mut arbiter, start) = arbiter_with(vec![rgb_fixture("a", "front")]);
    arbiter.set_vibe_provider(club());
    arbiter
        .trigger_effect(EffectTrigger::new(EffectKind::GhostBreath).max_duration(ms(200)))
        .unwrap();
    let wave = arbiter
        .trigger_effect(EffectTrigger::new(EffectKind::TidalWave))
        .unwrap();

    arbiter.arbitrate_at(start + ms(100));
    assert_eq!(arbiter.effects().len(), 2);
    assert!(arbiter.abort_effect(wave.id().unwrap()));
    assert_eq!(arbiter.effects().len(), 1);

    arbiter.arbitrate_at(start + ms(200));
    assert!(arbiter.effects().is_empty());
    assert_eq!(arbiter.abort_all_effects(), 0);
}
