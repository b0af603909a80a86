use clap::Subcommand;
use tarot_api::dto::ReadingRequest;
use tarot_api::models::GroupOrder;

use crate::client::TarotClient;
use crate::output::{self, OutputConfig};

/// Parses a group order such as `CAB`
fn parse_order(raw: &str) -> Result<Vec<GroupOrder>, String> {
    raw.chars().map(|c| c.to_string().parse::<GroupOrder>()).collect()
}

/// Commands talking to a running server
#[derive(Subcommand, Debug)]
pub enum ServerCommands {
    /// Check that the server is up
    Health,
    /// List the card catalogue
    Cards,
    /// Draw a new reading
    Draw {
        /// The question to ask
        question: String,
        /// Order of the three piles, e.g. CAB
        #[clap(long, default_value = "ABC")]
        order: String,
        /// Number of shuffle passes
        #[clap(long, default_value_t = 1)]
        shuffle_times: i64,
        /// Seed for a reproducible draw
        #[clap(long)]
        seed: Option<i64>,
        /// Keep every card upright
        #[clap(long)]
        no_reversed: bool,
    },
}

/// Executes a server command
pub async fn execute(
    client: &TarotClient,
    cmd: ServerCommands,
    config: &OutputConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        ServerCommands::Health => {
            let body = client.health().await?;
            output::print_health(&body, config);
        }
        ServerCommands::Cards => {
            let cards = client.list_cards().await?;
            output::print_cards(&cards.items, config);
        }
        ServerCommands::Draw {
            question,
            order,
            shuffle_times,
            seed,
            no_reversed,
        } => {
            let mut request = ReadingRequest::new(question, parse_order(&order)?);
            request.shuffle_times = shuffle_times;
            request.seed = seed;
            request.allow_reversed = !no_reversed;
            let reading = client.draw(&request).await?;
            output::print_reading(&reading, config);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_order() {
        assert_eq!(parse_order("CAB").unwrap(), vec![GroupOrder::C, GroupOrder::A, GroupOrder::B]);
        assert!(parse_order("ABX").is_err());
    }
}
