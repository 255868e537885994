use roboseed_kinematics::*;

fn main() {
    let max_speed = 2500.0; // units/s at full power
    let dt = 0.1; // Time step in seconds
    let steps_per_leg = 10;

    // forward, strafe right, back, strafe left
    let legs = [
        ChassisPower::new(0.0, 0.4, 0.0),
        ChassisPower::new(0.4, 0.0, 0.0),
        ChassisPower::new(0.0, -0.4, 0.0),
        ChassisPower::new(-0.4, 0.0, 0.0),
    ];

    let mut pose = FieldPose::new(0.0, 0.0, angle::degrees(30.0));

    println!("Initializing simulation...");
    println!("  Initial Pose: {}", pose);
    println!("  Top Speed:    {} units/s", max_speed);
    println!("  Time Step:    {} s", dt);

    for (leg, request) in legs.iter().enumerate() {
        let wheels = mix(*request);
        println!("\nLeg {}: request {} -> wheels {}", leg + 1, request, wheels);

        // what the chassis actually does with those wheel commands
        let achieved = unmix(wheels);
        let body_velocity = Vec2::new(achieved.x, achieved.y) * max_speed;

        for i in 0..steps_per_leg {
            match pose.integrate(body_velocity, 0.0, dt) {
                Ok(next) => {
                    pose = next;
                    println!("  Step {:>2}: Pose: {}", i + 1, pose);
                }
                Err(e) => {
                    eprintln!("Error during simulation step {}: {}", i + 1, e);
                    return;
                }
            }
        }
    }

    println!("\nSimulation complete.");
    println!("Final Pose: {:?}", pose);
    println!(
        "Heading drift from start: {:.3} rad",
        signed_angular_difference(angle::degrees(30.0), pose.heading)
    );
}
