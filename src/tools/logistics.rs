// src/tools/logistics.rs

use std::time::Duration;

use rand::Rng;
use rand::seq::SliceRandom;
use serde_json::{Value, json};
use tracing::info;

use crate::context::RuntimeContext;
use crate::error::{ConfigurationError, DomainActionError};
use crate::tools::{
    Simulation, Tool, ToolInput, ToolRegistry, ToolResult, ToolSpec, display_value, optional_str,
    require_str, require_value,
};

fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

pub struct DriverLocationTool {
    sim: Simulation,
}

impl Tool for DriverLocationTool {
    fn name(&self) -> &str {
        "get_driver_location"
    }

    fn description(&self) -> &str {
        "Returns the driver's current GPS position."
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec::new(self.name(), self.description())
            .input("driver_id", "string", "Driver to locate", true)
            .outputs(&["driver_id", "location"])
            .tags(&["driver", "location"])
    }

    fn execute(&self, ctx: &RuntimeContext, input: &ToolInput) -> Result<ToolResult, DomainActionError> {
        let driver_id = require_str(self.name(), input, "driver_id")?;
        let mut rng = self.sim.rng(ctx, self.name(), input);
        self.sim.call(ctx, self.name(), Duration::from_millis(500), &mut rng)?;

        let location = json!({
            "latitude": round6(rng.gen_range(3.0..4.0)),
            "longitude": round6(rng.gen_range(101.0..102.0)),
        });
        info!(driver_id, %location, "driver located");

        Ok(ToolResult::success()
            .with("driver_id", driver_id)
            .with("location", location))
    }
}

pub struct TrafficTool {
    sim: Simulation,
}

impl Tool for TrafficTool {
    fn name(&self) -> &str {
        "check_traffic"
    }

    fn description(&self) -> &str {
        "Estimates travel time and congestion between two points."
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec::new(self.name(), self.description())
            .input("start_point", "any", "Origin: address or coordinates", true)
            .input("end_point", "any", "Destination: address or coordinates", true)
            .outputs(&["travel_time_minutes", "congestion"])
            .tags(&["traffic", "routing"])
    }

    fn execute(&self, ctx: &RuntimeContext, input: &ToolInput) -> Result<ToolResult, DomainActionError> {
        let start = display_value(require_value(self.name(), input, "start_point")?);
        let end = display_value(require_value(self.name(), input, "end_point")?);
        let mut rng = self.sim.rng(ctx, self.name(), input);
        self.sim.call(ctx, self.name(), Duration::from_secs(1), &mut rng)?;

        let travel_time: u32 = rng.gen_range(15..=60);
        let congestion = match travel_time {
            46.. => "heavy",
            31..=45 => "moderate",
            _ => "light",
        };
        info!(%start, %end, travel_time, congestion, "traffic checked");

        Ok(ToolResult::success()
            .with("travel_time_minutes", travel_time)
            .with("congestion", congestion))
    }
}

const ROADS: &[&str] = &[
    "Jalan Tun Razak",
    "the Federal Highway",
    "the inner ring road",
    "Jalan Ampang",
    "the Sprint Expressway",
];

pub struct AlternativeRouteTool {
    sim: Simulation,
}

impl Tool for AlternativeRouteTool {
    fn name(&self) -> &str {
        "calculate_alternative_route"
    }

    fn description(&self) -> &str {
        "Computes a detour around a known obstruction and its ETA."
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec::new(self.name(), self.description())
            .input("start_point", "any", "Origin: address or coordinates", true)
            .input("end_point", "any", "Destination: address or coordinates", true)
            .outputs(&["route_id", "via", "eta_minutes"])
            .tags(&["traffic", "routing"])
    }

    fn execute(&self, ctx: &RuntimeContext, input: &ToolInput) -> Result<ToolResult, DomainActionError> {
        require_value(self.name(), input, "start_point")?;
        let end = display_value(require_value(self.name(), input, "end_point")?);
        let mut rng = self.sim.rng(ctx, self.name(), input);
        self.sim.call(ctx, self.name(), Duration::from_secs(1), &mut rng)?;

        let route_id = format!("route-{:04x}", rng.gen_range(0..0xffff_u32));
        let via = ROADS.choose(&mut rng).copied().unwrap_or("local roads");
        let eta: u32 = rng.gen_range(12..=40);
        info!(%end, %route_id, via, eta, "alternative route calculated");

        Ok(ToolResult::success()
            .with("route_id", route_id)
            .with("via", via)
            .with("eta_minutes", eta))
    }
}

pub struct RerouteDriverTool {
    sim: Simulation,
}

impl Tool for RerouteDriverTool {
    fn name(&self) -> &str {
        "reroute_driver"
    }

    fn description(&self) -> &str {
        "Assigns the driver a new route or interim task."
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec::new(self.name(), self.description())
            .input("driver_id", "string", "Driver to reroute", true)
            .input("route", "any", "Route id or task description", true)
            .input("reason", "string", "Why the driver is being rerouted", false)
            .input("eta_minutes", "integer", "ETA already computed for the route", false)
            .outputs(&["driver_id", "route", "eta_minutes"])
            .tags(&["driver", "routing"])
    }

    fn execute(&self, ctx: &RuntimeContext, input: &ToolInput) -> Result<ToolResult, DomainActionError> {
        let driver_id = require_str(self.name(), input, "driver_id")?;
        let route = require_value(self.name(), input, "route")?.clone();
        let reason = optional_str(input, "reason").unwrap_or("unspecified");
        let mut rng = self.sim.rng(ctx, self.name(), input);
        self.sim.call(ctx, self.name(), Duration::from_millis(500), &mut rng)?;

        let eta = match input.get("eta_minutes") {
            None | Some(Value::Null) => rng.gen_range(10..=30),
            Some(value) => value
                .as_u64()
                .ok_or_else(|| DomainActionError::invalid_input(self.name(), "eta_minutes", "a whole number"))?,
        };
        info!(driver_id, route = %display_value(&route), reason, eta, "driver rerouted");

        Ok(ToolResult::success()
            .with("driver_id", driver_id)
            .with("route", route)
            .with("eta_minutes", eta))
    }
}

pub struct FlightStatusTool {
    sim: Simulation,
}

impl Tool for FlightStatusTool {
    fn name(&self) -> &str {
        "check_flight_status"
    }

    fn description(&self) -> &str {
        "Looks up the departure status of a passenger's flight."
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec::new(self.name(), self.description())
            .input("flight_number", "string", "IATA flight number, e.g. MH123", true)
            .outputs(&["flight_number", "flight_state", "departure_in_minutes"])
            .tags(&["travel", "status"])
    }

    fn execute(&self, ctx: &RuntimeContext, input: &ToolInput) -> Result<ToolResult, DomainActionError> {
        let flight = require_str(self.name(), input, "flight_number")?;
        let mut rng = self.sim.rng(ctx, self.name(), input);
        self.sim.call(ctx, self.name(), Duration::from_millis(800), &mut rng)?;

        let state = ["on_time", "delayed", "boarding"]
            .choose(&mut rng)
            .copied()
            .unwrap_or("on_time");
        let departure: u32 = match state {
            "boarding" => rng.gen_range(20..=45),
            "delayed" => rng.gen_range(90..=240),
            _ => rng.gen_range(60..=180),
        };
        info!(flight, state, departure, "flight status checked");

        Ok(ToolResult::success()
            .with("flight_number", flight)
            .with("flight_state", state)
            .with("departure_in_minutes", departure))
    }
}

pub(crate) fn register(registry: &mut ToolRegistry, sim: &Simulation) -> Result<(), ConfigurationError> {
    registry.register(DriverLocationTool { sim: sim.clone() })?;
    registry.register(TrafficTool { sim: sim.clone() })?;
    registry.register(RerouteDriverTool { sim: sim.clone() })?;
    registry.register(AlternativeRouteTool { sim: sim.clone() })?;
    registry.register(FlightStatusTool { sim: sim.clone() })?;
    Ok(())
}
