//! Leaderboard computation.
//!
//! Standings are derived from the points recorded in race metrics, grouped by
//! vehicle category plus the synthetic [`ALL_GROUP`].

use std::collections::{BTreeMap, HashMap};

use crate::models::{ALL_GROUP, LeaderboardEntry, Race, RaceKey, Vehicle};

/// Leaderboards of record, keyed by group.
pub type Leaderboards = BTreeMap<String, Vec<LeaderboardEntry>>;

/// Recomputes every group's leaderboard.
///
/// Entries with equal totals keep the relative order they had in `previous`;
/// vehicles that were not ranked before follow in roster order. Rank deltas
/// are measured against `previous` and are zero for newly ranked vehicles.
pub fn recompute(
    vehicles: &BTreeMap<String, Vehicle>,
    races: &BTreeMap<RaceKey, Race>,
    previous: &Leaderboards,
) -> Leaderboards {
    let mut groups: BTreeMap<&str, Vec<&Vehicle>> = BTreeMap::new();
    groups.entry(ALL_GROUP).or_default();

    for vehicle in vehicles.values() {
        groups.entry(ALL_GROUP).or_default().push(vehicle);
        if vehicle.category != ALL_GROUP {
            groups.entry(vehicle.category.as_str()).or_default().push(vehicle);
        }
    }

    groups
        .into_iter()
        .map(|(group, members)| {
            let board = rank_group(&members, races, previous.get(group));
            (group.to_string(), board)
        })
        .collect()
}

fn rank_group(
    members: &[&Vehicle],
    races: &BTreeMap<RaceKey, Race>,
    previous: Option<&Vec<LeaderboardEntry>>,
) -> Vec<LeaderboardEntry> {
    let prior_ranks: HashMap<&str, usize> = previous
        .map(|entries| {
            entries
                .iter()
                .map(|e| (e.vehicle_id.as_str(), e.rank))
                .collect()
        })
        .unwrap_or_default();

    let mut entries: Vec<LeaderboardEntry> = members
        .iter()
        .filter_map(|vehicle| entry_for(vehicle, races))
        .collect();

    // Both sorts are stable: first restore the previous standing, then order by total.
    entries.sort_by_key(|e| {
        prior_ranks
            .get(e.vehicle_id.as_str())
            .copied()
            .unwrap_or(usize::MAX)
    });
    entries.sort_by_key(|e| std::cmp::Reverse(e.total_points()));

    for (index, entry) in entries.iter_mut().enumerate() {
        entry.rank = index + 1;
        entry.rank_delta = prior_ranks
            .get(entry.vehicle_id.as_str())
            .map(|old| *old as i64 - entry.rank as i64)
            .unwrap_or(0);
    }

    entries
}

/// Builds an entry from every race where the vehicle holds a non-negative score.
fn entry_for(vehicle: &Vehicle, races: &BTreeMap<RaceKey, Race>) -> Option<LeaderboardEntry> {
    let mut categories = Vec::new();
    let mut points = Vec::new();

    for race in races.values() {
        if let Some(metrics) = race.metrics.get(&vehicle.vehicle_id)
            && metrics.points >= 0
        {
            categories.push(race.race_name.clone());
            points.push(metrics.points);
        }
    }

    if points.is_empty() {
        return None;
    }

    Some(LeaderboardEntry {
        vehicle_id: vehicle.vehicle_id.clone(),
        username: vehicle.username.clone(),
        avatar: vehicle.avatar.clone(),
        categories,
        points,
        rank: 0,
        rank_delta: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RaceMetrics;

    fn vehicle(id: &str, category: &str) -> Vehicle {
        Vehicle {
            vehicle_id: id.to_string(),
            username: format!("driver-{id}"),
            avatar: String::new(),
            target_voltage: 48.0,
            max_current: 0.0,
            mass: 90.0,
            category: category.to_string(),
            current_race: None,
        }
    }

    fn roster(list: &[(&str, &str)]) -> BTreeMap<String, Vehicle> {
        list.iter()
            .map(|(id, category)| (id.to_string(), vehicle(id, category)))
            .collect()
    }

    fn race_with_points(name: &str, points: &[(&str, i32)]) -> (RaceKey, Race) {
        let key = RaceKey::new(name, 0);
        let mut race = Race::new(key.clone(), 0.0);
        for (id, p) in points {
            race.metrics.insert(id.to_string(), RaceMetrics::with_points(*p));
        }
        (key, race)
    }

    fn ids(board: &[LeaderboardEntry]) -> Vec<&str> {
        board.iter().map(|e| e.vehicle_id.as_str()).collect()
    }

    #[test]
    fn test_groups_include_all_and_each_category() {
        let vehicles = roster(&[("1", "junior"), ("2", "senior"), ("3", "junior")]);
        let races: BTreeMap<_, _> = [race_with_points("sprint", &[("1", 5), ("2", 7), ("3", 1)])]
            .into_iter()
            .collect();

        let boards = recompute(&vehicles, &races, &Leaderboards::new());

        assert_eq!(ids(&boards["all"]), vec!["2", "1", "3"]);
        assert_eq!(ids(&boards["junior"]), vec!["1", "3"]);
        assert_eq!(ids(&boards["senior"]), vec!["2"]);
        assert_eq!(boards["junior"][1].rank, 2);
    }

    #[test]
    fn test_points_are_summed_across_races() {
        let vehicles = roster(&[("1", "a"), ("2", "a")]);
        let races: BTreeMap<_, _> = [
            race_with_points("sprint", &[("1", 5), ("2", 7)]),
            race_with_points("endurance", &[("1", 10)]),
        ]
        .into_iter()
        .collect();

        let boards = recompute(&vehicles, &races, &Leaderboards::new());
        let first = &boards["all"][0];

        assert_eq!(first.vehicle_id, "1");
        assert_eq!(first.total_points(), 15);
        assert_eq!(first.categories, vec!["endurance", "sprint"]);
    }

    #[test]
    fn test_vehicles_without_points_are_not_ranked() {
        let vehicles = roster(&[("1", "a"), ("2", "a"), ("3", "a")]);
        let races: BTreeMap<_, _> = [race_with_points("sprint", &[("1", 3), ("2", -1)])]
            .into_iter()
            .collect();

        let boards = recompute(&vehicles, &races, &Leaderboards::new());

        assert_eq!(ids(&boards["all"]), vec!["1"]);
    }

    #[test]
    fn test_ties_keep_previous_relative_order() {
        let vehicles = roster(&[("1", "a"), ("2", "a"), ("3", "a")]);
        let first_races: BTreeMap<_, _> = [race_with_points("sprint", &[("1", 1), ("2", 2), ("3", 3)])]
            .into_iter()
            .collect();
        let previous = recompute(&vehicles, &first_races, &Leaderboards::new());
        assert_eq!(ids(&previous["all"]), vec!["3", "2", "1"]);

        let tied: BTreeMap<_, _> = [race_with_points("sprint", &[("1", 4), ("2", 4), ("3", 4)])]
            .into_iter()
            .collect();
        let boards = recompute(&vehicles, &tied, &previous);

        assert_eq!(ids(&boards["all"]), vec!["3", "2", "1"]);
        assert!(boards["all"].iter().all(|e| e.rank_delta == 0));
    }

    #[test]
    fn test_rank_delta_sign_convention() {
        let vehicles = roster(&[("1", "a"), ("2", "a"), ("3", "a"), ("4", "a"), ("5", "a")]);
        let before: BTreeMap<_, _> = [race_with_points(
            "sprint",
            &[("1", 50), ("2", 40), ("3", 30), ("4", 20), ("5", 10)],
        )]
        .into_iter()
        .collect();
        let previous = recompute(&vehicles, &before, &Leaderboards::new());
        assert_eq!(previous["all"][4].vehicle_id, "5");

        let after: BTreeMap<_, _> = [race_with_points(
            "sprint",
            &[("1", 50), ("2", 40), ("3", 30), ("4", 20), ("5", 45)],
        )]
        .into_iter()
        .collect();
        let boards = recompute(&vehicles, &after, &previous);
        let climber = boards["all"].iter().find(|e| e.vehicle_id == "5").unwrap();

        assert_eq!(climber.rank, 2);
        assert_eq!(climber.rank_delta, 3);
        let dropped = boards["all"].iter().find(|e| e.vehicle_id == "4").unwrap();
        assert_eq!(dropped.rank_delta, -1);
    }

    #[test]
    fn test_newly_ranked_vehicle_has_zero_delta() {
        let vehicles = roster(&[("1", "a"), ("2", "a")]);
        let before: BTreeMap<_, _> = [race_with_points("sprint", &[("1", 5)])]
            .into_iter()
            .collect();
        let previous = recompute(&vehicles, &before, &Leaderboards::new());

        let after: BTreeMap<_, _> = [race_with_points("sprint", &[("1", 5), ("2", 9)])]
            .into_iter()
            .collect();
        let boards = recompute(&vehicles, &after, &previous);

        assert_eq!(boards["all"][0].vehicle_id, "2");
        assert_eq!(boards["all"][0].rank_delta, 0);
        assert_eq!(boards["all"][1].rank_delta, -1);
    }
}
