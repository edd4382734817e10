use colonyforge::*;

fn capacity_invariant_holds(s: &Scheduler) -> bool {
    s.queue.tasks().iter().all(|t| {
        let bound_here = s
            .registry
            .tracked()
            .filter(|id| s.registry.bound_task(*id) == Some(t.key))
            .count() as u32;
        t.bound == bound_here
    })
}

#[test]
fn end_to_end_colony_builds_a_site() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let mut world = World::new();
    for id in 1..=3 {
        world.spawn(Agent::new(id));
    }
    world.colony.add_deposit(Deposit {
        id: 1,
        resource: Resource::Stone,
        remaining: 10_000,
    });
    world.colony.add_site(Site::construction(2, 30));

    let ctx = SchedulerContext::new("colony-7", Box::new(MemStore::new()));
    let mut s = Scheduler::new(ctx);

    // a standing harvest task plus one construction job, dispatched in one
    // pass so the backlog is distributed instead of piling every worker
    // onto whichever task lands first
    let deferred = AddOpts {
        dispatch: false,
        unique: false,
    };
    s.add_task(
        &mut world,
        TaskSpec::new(TaskKind::Harvest { node: 1 }, 1).capacity(2),
        deferred,
    )
    .unwrap();
    let build = s
        .add_task(
            &mut world,
            TaskSpec::new(TaskKind::Build { site: 2 }, 5),
            deferred,
        )
        .unwrap();
    s.dispatch_all(&mut world);

    // the build task outranks harvesting, so exactly one worker takes it
    // and the other two keep the stockpile fed
    assert_eq!(s.task(build).unwrap().bound, 1);

    let mut finished_at = None;
    for tick in 1..=60 {
        s.tick(&mut world);
        assert!(
            capacity_invariant_holds(&s),
            "capacity invariant at tick {tick}"
        );
        if world.colony.site(2).is_some_and(|site| site.finished()) {
            finished_at = Some(tick);
            break;
        }
    }
    assert!(finished_at.is_some(), "site never finished");

    // the build task removed itself on completion and its worker rejoined
    // the harvest crew via overflow
    assert!(!s.queue.has_kind("build"));
    let harvest = &s.queue.tasks()[0];
    assert_eq!(harvest.bound, 3);
    assert!(capacity_invariant_holds(&s));

    // harvesters have been feeding the stockpile all along
    for _ in 0..10 {
        s.tick(&mut world);
    }
    assert!(world.colony.stockpile.stone > 0);

    // status panels reflect the live state
    let queue_panel = format_queue(&s.queue);
    assert!(queue_panel[0].contains("colony-7"));
    assert!(queue_panel.iter().any(|l| l.contains("Harvest deposit 1")));
    let agent_panel = format_agents(&world, &s.registry);
    assert!(agent_panel.iter().any(|l| l.contains("Agent #1")));
}

#[test]
fn queue_survives_a_restart() {
    let mut world = World::new();
    world.colony.add_site(Site::storage(1));
    world.colony.add_site(Site::construction(2, 100));
    world.colony.add_deposit(Deposit {
        id: 3,
        resource: Resource::Iron,
        remaining: 500,
    });

    let ctx = SchedulerContext::new("colony-7", Box::new(MemStore::new()));
    let mut s = Scheduler::new(ctx);
    let opts = AddOpts {
        dispatch: false,
        unique: false,
    };
    s.add_task(
        &mut world,
        TaskSpec::new(
            TaskKind::Haul {
                resource: Resource::Iron,
                amount: 40,
                dest: 1,
            },
            3,
        ),
        opts,
    )
    .unwrap();
    s.add_task(
        &mut world,
        TaskSpec::new(TaskKind::Build { site: 2 }, 7)
            .capacity(2)
            .affinity(AffinityTag::new("mason")),
        opts,
    )
    .unwrap();
    let before: Vec<Task> = s.queue.tasks().to_vec();

    // simulate a restart: carry the blob into a fresh store and rebuild
    let blob = s.ctx.store.read("colony-7").expect("queue was persisted");
    let mut store = MemStore::new();
    store.write("colony-7", &blob);
    let restarted = Scheduler::new(SchedulerContext::new("colony-7", Box::new(store)));

    assert_eq!(restarted.queue.tasks(), &before[..]);
}

#[test]
fn dead_worker_frees_its_slot() {
    let mut world = World::new();
    world.spawn(Agent::new(1));
    world.spawn(Agent::new(2));
    world.colony.add_deposit(Deposit {
        id: 1,
        resource: Resource::Stone,
        remaining: 1_000,
    });

    let mut s = Scheduler::new(SchedulerContext::new("colony-7", Box::new(MemStore::new())));
    let key = s
        .add_task(
            &mut world,
            TaskSpec::new(TaskKind::Harvest { node: 1 }, 1).capacity(2),
            AddOpts::default(),
        )
        .unwrap();
    assert_eq!(s.task(key).unwrap().bound, 2);

    // worker 1 disappears; the stale binding is collected on the next pass
    world.remove_agent(1);
    s.tick(&mut world);
    assert_eq!(s.task(key).unwrap().bound, 1);
    assert_eq!(s.registry.bound_task(2), Some(key));
    assert!(capacity_invariant_holds(&s));
}
