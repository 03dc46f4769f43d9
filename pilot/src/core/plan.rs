//! Compiled-in long-term plan for the opening of the game.

use super::goals::Goal;

/// Default goal list used when no persisted plan is available.
pub fn default_plan() -> Vec<Goal> {
    vec![
        Goal::new(
            "start_game",
            "Start the game and get through the intro",
            &["your very own adventure", "well, i'll be expecting you"],
        ),
        Goal::new(
            "leave_the_truck",
            "Leave the moving truck by walking RIGHT",
            &["your room is upstairs", "player's house", "mom"],
        )
        .movement_only(),
        Goal::new(
            "go_upstairs",
            "Go upstairs to the second floor",
            &["2f", "second floor"],
        ),
        Goal::new(
            "player_bedroom_entered",
            "Find the clock in the bedroom",
            &["this is your room", "nintendo gamecube"],
        ),
        Goal::new(
            "set_bedroom_clock",
            "Set the wall clock",
            &["set the time", "set the clock", "better set it"],
        ),
        Goal::new("return_downstairs", "Go back downstairs", &["1f"]),
        Goal::new(
            "exit_player_house",
            "Leave the house and step into Littleroot Town",
            &["littleroot"],
        )
        .movement_only(),
        Goal::new(
            "go_to_birch_lab",
            "Go to Professor Birch's lab next door",
            &["birch's lab", "pokemon lab"],
        ),
        Goal::new("find_route_101", "Find Route 101", &["route 101", "route101"]),
        Goal::new(
            "find_professor_birch",
            "Find Professor Birch being chased",
            &["help me", "in my bag"],
        ),
        Goal::new(
            "choose_starter",
            "Help Professor Birch by choosing a starter",
            &["chose mudkip", "chose torchic", "chose treecko", "received pokemon"],
        ),
        Goal::new(
            "first_rival_battle",
            "Battle the rival on Route 103 and win",
            &["defeated may", "defeated brendan", "battle_result=win"],
        ),
        Goal::new(
            "oldale_town_visit",
            "Visit Oldale Town and heal up",
            &["oldale town", "pokecenter", "healed"],
        ),
        Goal::new(
            "rustboro_gym_challenge",
            "Defeat Roxanne for the Stone Badge",
            &["roxanne", "stone badge"],
        ),
    ]
}
