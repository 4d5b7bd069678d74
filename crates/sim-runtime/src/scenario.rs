//! Seeded demo world used by `cli init` and the benches.

use crate::production::{start_job, JobRequest};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sim_core::{
    validate_world, OrderSide, RecipeInput, SimError, StockKey, WorkforceAllocation, WorldState,
};
use sim_econ::{create_contract, place_order, set_workforce_allocation, ContractRequest, OrderRequest};
use tracing::info;

/// Shape of the generated world.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScenarioParams {
    pub players: usize,
    pub bots: usize,
    pub orders_per_company: usize,
}

impl Default for ScenarioParams {
    fn default() -> Self {
        Self {
            players: 4,
            bots: 2,
            orders_per_company: 3,
        }
    }
}

/// Build a small two-region economy. Identical seeds give identical worlds.
pub fn demo_world(seed: u64, params: &ScenarioParams) -> Result<WorldState, SimError> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut world = WorldState::default();
    let regions = [world.add_region("North"), world.add_region("South")];
    let ore = world.add_item("Ore");
    let ingot = world.add_item("Ingot");
    let recipe = world.add_recipe(
        "Smelt ingot",
        "smelter",
        vec![RecipeInput {
            item_id: ore,
            quantity: 2,
        }],
        ingot,
        1,
        30,
    );
    world.market_pool_cents = 500_000;

    let mut players = Vec::with_capacity(params.players);
    for i in 0..params.players {
        let cash = rng.gen_range(50_000..=150_000);
        let id = world.add_company(&format!("Player {}", i + 1), cash, false);
        let region = regions[i % regions.len()];
        let building = world.add_building(id, region, "smelter", 2);
        world
            .inventory
            .add(StockKey::new(id, region, ore), rng.gen_range(20..=80))?;
        players.push((id, region, building));
    }
    let mut bots = Vec::with_capacity(params.bots);
    for i in 0..params.bots {
        let id = world.add_company(&format!("Bot {}", i + 1), 200_000, true);
        for &region in &regions {
            world
                .inventory
                .add(StockKey::new(id, region, ore), 500)?;
        }
        bots.push(id);
    }

    for &(company, _, _) in &players {
        let ops = rng.gen_range(25..=55u8);
        let rest = 100 - ops;
        set_workforce_allocation(
            &mut world,
            WorkforceAllocation {
                company_id: company,
                operations_pct: ops,
                research_pct: rest / 3,
                logistics_pct: rest / 3,
                corporate_pct: rest - 2 * (rest / 3),
            },
        )?;
    }

    // Bots quote ore on both regions; players bid for it.
    for &bot in &bots {
        for &region in &regions {
            for _ in 0..params.orders_per_company {
                let req = OrderRequest {
                    company_id: bot,
                    region_id: region,
                    item_id: ore,
                    side: OrderSide::Sell,
                    price_cents: rng.gen_range(90..=110),
                    quantity: rng.gen_range(5..=25),
                };
                place_order(&mut world, &req)?;
            }
        }
    }
    for &(company, region, building) in &players {
        for _ in 0..params.orders_per_company {
            let req = OrderRequest {
                company_id: company,
                region_id: region,
                item_id: ore,
                side: OrderSide::Buy,
                price_cents: rng.gen_range(85..=105),
                quantity: rng.gen_range(1..=10),
            };
            place_order(&mut world, &req)?;
        }
        let job = JobRequest {
            company_id: company,
            building_id: building,
            recipe_id: recipe,
            quantity: 1,
        };
        start_job(&mut world, &job)?;
        let contract = ContractRequest {
            seller_company_id: company,
            buyer_company_id: None,
            region_id: region,
            item_id: ingot,
            quantity: 10,
            price_cents: 400,
        };
        create_contract(&mut world, &contract)?;
    }

    validate_world(&world)?;
    info!(
        seed,
        companies = world.companies.len(),
        orders = world.orders.len(),
        "demo world generated"
    );
    Ok(world)
}
