mod deadline;
mod lock;
