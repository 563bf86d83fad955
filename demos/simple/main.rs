use std::time::Duration;

use ofrep::{EvaluationContext, FeatureEvent, ProviderEvent};

pub fn main() -> ofrep::Result<()> {
    // Configure env_logger to see provider logs.
    env_logger::Builder::from_env(env_logger::Env::new().default_filter_or("ofrep")).init();

    let endpoint =
        std::env::var("OFREP_ENDPOINT").unwrap_or_else(|_| "http://localhost:1031".to_owned());
    let mut config = ofrep::ProviderConfig::from_endpoint(endpoint)
        .polling_interval(Duration::from_secs(30))
        .polling_jitter(Duration::from_secs(3))
        .data_collector(|event: FeatureEvent| {
            println!("Collected feature event: {:?}", event);
        });
    if let Ok(api_key) = std::env::var("OFREP_API_KEY") {
        config = config.api_key(api_key);
    }
    let provider = config.to_provider()?;

    let events = provider.subscribe();
    std::thread::spawn(move || {
        for event in events {
            match event {
                ProviderEvent::Error(err) => println!("Provider error: {}", err),
                event => println!("Provider is now {:?}", event.state()),
            }
        }
    });

    // Start the poller thread and block waiting for the first evaluation. Until then, all flag
    // reads return their default value.
    provider.initialize(Some(
        EvaluationContext::new("test-subject").with_attribute("country", "FR"),
    ))?;
    if let Err(err) = provider.wait_for_initialization() {
        println!("error evaluating flags: {:?}", err);
    }

    let evaluation = provider.get_boolean_evaluation("a-boolean-flag", false);
    println!("Evaluation: {:?}", evaluation);

    // Changing the context triggers a new bulk evaluation in the background.
    provider.set_context(EvaluationContext::new("another-subject"))?;
    std::thread::sleep(Duration::from_secs(1));

    let evaluation = provider.get_boolean_evaluation("a-boolean-flag", false);
    println!("Evaluation: {:?}", evaluation);

    provider.shutdown()
}
