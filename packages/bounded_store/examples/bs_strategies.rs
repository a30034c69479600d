//! Observing and limiting the memory of a `BoundedStore` through allocation strategies:
//!
//! * `Tracked` counts every operation the store performs on its strategy.
//! * `Budgeted` refuses reservations beyond a byte budget.
//! * A failed construction rolls back everything it already did.

use bounded_store::{AllocationFailure, BoundedStore, Budgeted, Global, Tracked};

#[derive(Debug)]
enum ReadingError {
    Allocation(AllocationFailure),
    SensorOffline(usize),
}

impl From<AllocationFailure> for ReadingError {
    fn from(value: AllocationFailure) -> Self {
        Self::Allocation(value)
    }
}

fn main() {
    let tracked = Tracked::new(Global);
    let budget = Budgeted::new(tracked.clone(), 256);

    let readings = BoundedStore::<f64, _>::from_fn_in(16, budget.clone(), |index| {
        f64::from(u32::try_from(index).unwrap()) * 0.5
    })
    .unwrap();

    println!(
        "Stored {} readings, {} bytes of budget left",
        readings.len(),
        budget.available_bytes()
    );
    println!("{:?}", tracked.report());

    // The budget is exhausted, so this never reaches the global allocator.
    match BoundedStore::<f64, _>::with_len_in(32, budget.clone()) {
        Ok(_) => println!("Unexpectedly got a second store"),
        Err(failure) => println!("Second store refused: {failure}"),
    }

    drop(readings);

    // Sensor 5 is offline, so the construction fails halfway and is rolled back.
    let result = BoundedStore::<f64, _>::try_from_fn_in(8, budget.clone(), |index| {
        if index == 5 {
            Err(ReadingError::SensorOffline(index))
        } else {
            Ok(1.0)
        }
    });

    match result {
        Ok(_) => println!("Unexpectedly read every sensor"),
        Err(ReadingError::SensorOffline(sensor)) => {
            println!("Sensor {sensor} is offline, the partial construction was rolled back");
        }
        Err(ReadingError::Allocation(failure)) => println!("Could not reserve memory: {failure}"),
    }

    let report = tracked.report();
    println!(
        "Live elements: {}, outstanding blocks: {}",
        report.live_elements(),
        report.outstanding_blocks()
    );
}
