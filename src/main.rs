fn main() {
    activity_recorder_lib::run()
}
