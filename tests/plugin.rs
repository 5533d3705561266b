use bevy::prelude::*;

use gridlock::activation::BodyTable;
use gridlock::plugin::{AgentHandle, CityAgent, TrackedAgent};
use gridlock::world::settings::{LayoutSettings, SeedSetting};
use gridlock::world::WorldSeed;
use gridlock::{CityBuilt, CityPlugin, CitySettings, CityWorld, RebuildCity};

fn app() -> App {
    let mut app = App::new();
    app.add_plugins(MinimalPlugins)
        .insert_resource(CitySettings {
            seed: SeedSetting::Fixed(42),
            layout: LayoutSettings { grid_size: 6, ..Default::default() },
            ..Default::default()
        })
        .add_plugins(CityPlugin);
    app.update();
    app
}

#[test]
fn startup_builds_the_city() {
    let app = app();
    let world = app.world().resource::<CityWorld>();
    assert_eq!(world.seed(), WorldSeed(42));
    assert_eq!(world.block_archetypes().len(), 36);
    assert!(!world.arena().is_empty());

    let built = app.world().resource::<Events<CityBuilt>>();
    let mut reader = built.get_cursor();
    let ev = reader.read(built).last().copied().unwrap();
    assert_eq!(ev.seed, WorldSeed(42));
    assert_eq!(ev.objects, world.arena().len());
}

#[test]
fn agents_are_indexed_and_survive_rebuilds() {
    let mut app = app();
    let agent = app
        .world_mut()
        .spawn((TrackedAgent, CityAgent::default(), Transform::from_xyz(3.0, 0.9, -4.0)))
        .id();
    app.update();

    let handle = *app.world().get::<AgentHandle>(agent).unwrap();
    assert!(app.world().resource::<CityWorld>().grid().is_dynamic(handle.object));

    app.world_mut().send_event(RebuildCity { seed: Some(7) });
    app.update();
    assert_eq!(app.world().resource::<CityWorld>().seed(), WorldSeed(7));

    // the old handle is stripped by the rebuild; the agent is registered again exactly once
    app.update();
    let handle = *app.world().get::<AgentHandle>(agent).unwrap();
    let world = app.world().resource::<CityWorld>();
    assert!(world.grid().is_dynamic(handle.object));
    assert_eq!(world.arena().dynamic_ids().len(), 1);

    app.world_mut().entity_mut(agent).despawn();
    app.update();
    let world = app.world().resource::<CityWorld>();
    assert!(world.arena().dynamic_ids().is_empty());
}

#[test]
fn despawned_agents_free_their_bodies() {
    let mut app = app();
    let counts = |app: &App| {
        let bodies = app.world().resource::<BodyTable>();
        (bodies.len(), bodies.in_world_count())
    };
    let before = counts(&app);

    let agent = app.world_mut().spawn((CityAgent::default(), Transform::from_xyz(1.0, 0.9, 2.0))).id();
    app.update();
    let handle = *app.world().get::<AgentHandle>(agent).unwrap();
    assert_eq!(counts(&app), (before.0 + 1, before.1 + 1));

    app.world_mut().entity_mut(agent).despawn();
    app.update();
    assert_eq!(counts(&app), before);
    assert!(app.world().resource::<BodyTable>().get(handle.body).is_none());
}
